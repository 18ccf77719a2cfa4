#![forbid(unsafe_code)]

use std::io;
use std::sync::mpsc::Sender;
use std::thread;

use inotify::{EventMask, Inotify};

use crate::input::{Event, Source};

/// Drains change events on a background thread; each non-empty batch becomes
/// one `Changed` for the interpreter, which reloads from the root.
pub(crate) fn spawn(mut inotify: Inotify, tx: Sender<Event>) -> io::Result<()> {
    thread::Builder::new().name("watch".into()).spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            let events = match inotify.read_events_blocking(&mut buffer) {
                Ok(events) => events,
                Err(err) => {
                    let _ = tx.send(Event::Failed(Source::Watch, err));
                    return;
                }
            };
            let mut batch = 0usize;
            for event in events {
                let name = event.name.map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                log::debug!("watch: {} '{name}'", describe(event.mask));
                batch += 1;
            }
            if batch > 0 && tx.send(Event::Changed).is_err() {
                return;
            }
        }
    })?;
    Ok(())
}

fn describe(mask: EventMask) -> &'static str {
    if mask.intersects(EventMask::CREATE | EventMask::MOVED_TO) {
        "create"
    } else if mask.intersects(EventMask::DELETE | EventMask::MOVED_FROM) {
        "delete"
    } else if mask.contains(EventMask::ATTRIB) {
        "attrib"
    } else if mask.contains(EventMask::IGNORED) {
        "unwatched"
    } else {
        "other"
    }
}
