use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::Event;
use crossterm::event::{poll, read};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

const POLL_MS: u64 = 100;

/// Terminal input as an async stream.
///
/// crossterm's `poll`/`read` block, so they run on a blocking thread that
/// exits once `should_stop` is set or the stream is dropped.
pub fn async_key_events(should_stop: Arc<AtomicBool>) -> impl Stream<Item = Event> {
    let (tx, rx) = mpsc::channel(100);

    tokio::task::spawn_blocking(move || {
        while !should_stop.load(Ordering::Relaxed) {
            match poll(Duration::from_millis(POLL_MS)) {
                Ok(true) => {
                    if let Ok(event) = read() {
                        if tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Error polling for events: {e}");
                    break;
                }
            }
        }
    });

    ReceiverStream::new(rx)
}
