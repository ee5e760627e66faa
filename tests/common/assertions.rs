//! Event collection helpers

use tiktok_dl::Event;
use tokio::sync::broadcast;

/// Drain every event already sent on `rx`
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// URLs of all navigation events
pub fn navigations(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Navigate { url } => Some(url.clone()),
            _ => None,
        })
        .collect()
}
