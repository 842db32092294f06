/**
Line-oriented output of the watch feed for `--stream` mode.

Each event becomes one JSON object on stdout; each watch error goes to stderr.
*/
use crate::error::{Error, Result};
use crate::k8s::watch::{ResourceKind, WatchEvent, WatchEventKind, WatchManager};
use k8s_openapi::serde_json;
use serde::Serialize;
use std::io::Write;
use tracing::info;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedLine<'a> {
    pub kind: ResourceKind,
    pub event: WatchEventKind,
    pub namespace: Option<&'a str>,
    pub name: Option<&'a str>,
    pub resource_version: Option<&'a str>,
    pub summary: String,
    pub received_at: String,
}

impl<'a> From<&'a WatchEvent> for FeedLine<'a> {
    fn from(event: &'a WatchEvent) -> Self {
        Self {
            kind: event.kind,
            event: event.event,
            namespace: event.namespace(),
            name: event.name(),
            resource_version: event.resource_version(),
            summary: event.kind.summarize(&event.object),
            received_at: event.received_at.to_rfc3339(),
        }
    }
}

/// Serialize one event as a single JSON line
///
/// # Errors
///
/// Will return `Err` if the event cannot be serialized
pub fn format_event(event: &WatchEvent) -> Result<String> {
    Ok(serde_json::to_string(&FeedLine::from(event))?)
}

/// Print the feed until Ctrl-C or until every producer is gone
///
/// # Errors
///
/// Will return `Err` if the queues were already taken or stdout is closed
pub async fn print_feed(manager: &WatchManager) -> Result<()> {
    let mut events = manager
        .take_event_queue()
        .ok_or_else(|| Error::Custom("watch event queue already taken".to_string()))?;
    let mut errors = manager
        .take_error_queue()
        .ok_or_else(|| Error::Custom("watch error queue already taken".to_string()))?;

    let mut stdout = std::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, stopping feed");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    writeln!(stdout, "{}", format_event(&event)?)?;
                    stdout.flush()?;
                }
                None => break,
            },
            Some(err) = errors.recv() => {
                eprintln!("{err}");
            }
        }
    }
    Ok(())
}
