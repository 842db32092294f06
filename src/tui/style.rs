use crate::k8s::watch::ConnectionState;
use ratatui::prelude::*;
use style::palette::tailwind;

/// Accent palettes cycled with `c`
pub const PALETTES: [tailwind::Palette; 4] = [
    tailwind::BLUE,
    tailwind::EMERALD,
    tailwind::INDIGO,
    tailwind::RED,
];

pub const INFO_TEXT: &str = "(q) quit | (tab) next kind | (↑/↓) move | (r) restart kind | (R) restart all | (n) namespace | (d) debug | (c) color";

pub const ITEM_HEIGHT: usize = 1;

/// Colours derived from one accent palette over the slate base
#[derive(Clone, Debug)]
pub struct TableColors {
    pub(crate) background: Color,
    pub(crate) text: Color,
    pub(crate) accent: Color,
    header_bg: Color,
    row_even: Color,
    row_odd: Color,
}

impl TableColors {
    pub const fn new(accent: &tailwind::Palette) -> Self {
        Self {
            background: tailwind::SLATE.c950,
            text: tailwind::SLATE.c200,
            accent: accent.c400,
            header_bg: accent.c900,
            row_even: tailwind::SLATE.c950,
            row_odd: tailwind::SLATE.c900,
        }
    }

    pub fn base(&self) -> Style {
        Style::new().fg(self.text).bg(self.background)
    }

    pub fn header(&self) -> Style {
        Style::new().fg(self.text).bg(self.header_bg)
    }

    /// Zebra striping by row index
    pub fn row(&self, index: usize) -> Style {
        let bg = if index % 2 == 0 { self.row_even } else { self.row_odd };
        Style::new().fg(self.text).bg(bg)
    }

    pub fn selected(&self) -> Style {
        Style::new().fg(self.accent).add_modifier(Modifier::REVERSED)
    }

    pub fn border(&self) -> Style {
        Style::new().fg(self.accent)
    }
}

pub const fn state_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => tailwind::EMERALD.c400,
        ConnectionState::Connecting => tailwind::SKY.c400,
        ConnectionState::Reconnecting => tailwind::AMBER.c400,
        ConnectionState::Error => tailwind::RED.c500,
        ConnectionState::Disconnected => tailwind::SLATE.c500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_alternate() {
        let colors = TableColors::new(&PALETTES[0]);
        assert_eq!(colors.row(0), colors.row(2));
        assert_ne!(colors.row(0), colors.row(1));
    }
}
