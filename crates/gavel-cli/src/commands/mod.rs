//! Subcommand implementations

pub mod console;
pub mod demo;
pub mod simulate;

use gavel_types::AuctionEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::display;

/// Print presentation events until the house closes its event stream
pub fn spawn_printer(mut events: broadcast::Receiver<AuctionEvent>, json: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if json => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Event not serializable"),
                },
                Ok(event) => {
                    if let Some(line) = display::render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
