use serde::Serialize;
use std::fmt;

/// Connection health of a single watcher, or of all of them combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    /// Combine per-watcher states into one signal.
    ///
    /// Precedence: any `Error`, then any `Reconnecting`, then any `Connecting`.
    /// Only a non-empty set where every watcher is `Connected` is `Connected`;
    /// everything else (including no watchers) is `Disconnected`.
    pub fn aggregate<I>(states: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut any = false;
        let mut all_connected = true;
        let mut reconnecting = false;
        let mut connecting = false;

        for state in states {
            any = true;
            match state {
                Self::Error => return Self::Error,
                Self::Reconnecting => reconnecting = true,
                Self::Connecting => connecting = true,
                Self::Connected | Self::Disconnected => {}
            }
            if state != Self::Connected {
                all_connected = false;
            }
        }

        if reconnecting {
            Self::Reconnecting
        } else if connecting {
            Self::Connecting
        } else if any && all_connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
