use crate::tui::app::{App, Mode};
use crate::tui::style::{INFO_TEXT, state_color};
use chrono::Utc;
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::{
        Block, BorderType, Borders, Cell, Clear, HighlightSpacing, Paragraph, Row, Scrollbar,
        ScrollbarOrientation, Table, Tabs,
    },
};

pub fn ui(f: &mut Frame, app: &mut App) {
    let rects = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(5),
        Constraint::Length(if app.debug { 5 } else { 4 }),
    ])
    .split(f.area());

    render_tabs(f, app, rects[0]);
    render_table(f, app, rects[1]);
    render_scrollbar(f, app, rects[1]);
    render_footer(f, app, rects[2]);

    if app.mode == Mode::EditNamespace {
        render_namespace_edit(f, app);
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = app
        .kinds
        .iter()
        .map(|kind| {
            let state = app.connection_states.get(kind).copied().unwrap_or_default();
            let count = app.tables.get(kind).map_or(0, |t| t.len());
            Line::from(vec![
                Span::raw(format!("{kind} ({count}) ")),
                Span::styled("●", Style::new().fg(state_color(state))),
            ])
        })
        .collect();

    let namespace = if app.namespace.is_empty() {
        "all namespaces"
    } else {
        app.namespace.as_str()
    };
    let tabs = Tabs::new(titles)
        .select(app.selected_kind)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(format!(" kubewatch: {namespace} "))
                .border_style(app.colors.border()),
        )
        .style(app.colors.base())
        .highlight_style(
            Style::new()
                .fg(app.colors.accent)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn render_table(f: &mut Frame, app: &mut App, area: Rect) {
    let header = ["Namespace", "Name", "Status", "Last Event", "Age"]
        .iter()
        .copied()
        .map(Cell::from)
        .collect::<Row>()
        .style(app.colors.header())
        .height(1);

    let now = Utc::now();
    let rows: Vec<Row> = app
        .selected_table()
        .map(|table| {
            table
                .rows()
                .enumerate()
                .map(|(i, row)| {
                    row.cells(now)
                        .into_iter()
                        .map(Cell::from)
                        .collect::<Row>()
                        .style(app.colors.row(i))
                        .height(1)
                })
                .collect()
        })
        .unwrap_or_default();

    let bar = " █ ";
    let t = Table::new(
        rows,
        [
            Constraint::Percentage(15),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
            Constraint::Length(10),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .row_highlight_style(app.colors.selected())
    .highlight_symbol(bar)
    .bg(app.colors.background)
    .highlight_spacing(HighlightSpacing::Always);
    f.render_stateful_widget(t, area, &mut app.state);
}

fn render_scrollbar(f: &mut Frame, app: &mut App, area: Rect) {
    f.render_stateful_widget(
        Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None),
        area.inner(Margin {
            vertical: 1,
            horizontal: 1,
        }),
        &mut app.scroll_state,
    );
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let states = app
        .connection_states
        .iter()
        .map(|(kind, state)| format!("{kind}: {state}"))
        .join("  ");

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} ", app.overall),
                Style::new()
                    .fg(state_color(app.overall))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("| {states} | events: {}", app.events_seen)),
        ]),
        Line::from(
            app.status_message
                .clone()
                .or_else(|| app.last_error.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| INFO_TEXT.to_string()),
        ),
    ];
    if app.debug {
        let versions = app
            .resource_versions
            .iter()
            .map(|(kind, rv)| format!("{kind}@{}", if rv.is_empty() { "-" } else { rv }))
            .join("  ");
        lines.push(Line::from(format!("resource versions: {versions}")));
    }

    let footer = Paragraph::new(lines).style(app.colors.base()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(app.colors.border()),
    );
    f.render_widget(footer, area);
}

fn render_namespace_edit(f: &mut Frame, app: &App) {
    let input_area = centered_rect(60, 20, f.area());
    let block = Paragraph::new(app.namespace_input.as_str())
        .style(app.colors.header())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Namespace - empty for all namespaces"),
        );

    f.render_widget(Clear, input_area);
    f.render_widget(block, input_area);

    #[allow(clippy::cast_possible_truncation)]
    let p = Position {
        x: input_area.x + app.namespace_input.chars().count() as u16 + 1,
        y: input_area.y + 1,
    };
    f.set_cursor_position(p);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::watch::ResourceKind;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_renders_tabs_and_footer() {
        let backend = TestBackend::new(120, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = App::new(
            vec![ResourceKind::Pods, ResourceKind::Events],
            "shop".to_string(),
        );
        terminal.draw(|f| ui(f, &mut app)).unwrap();

        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect();
        assert!(rendered.contains("kubewatch: shop"));
        assert!(rendered.contains("pods (0)"));
        assert!(rendered.contains("Disconnected"));
    }
}
