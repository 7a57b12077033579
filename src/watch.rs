//! Filesystem-change events (C8's producer side) and the thread that watches a
//! mount root for them.
//!
//! [`WatchEvent`] reduces raw platform events to the vocabulary the file index
//! reacts to: `added`, `modified`, `removed`, `renamed_old`, `renamed_new`.
//! Keeping it as a small, pure enum
//! (instead of threading raw `notify::Event`s all the way to the file index)
//! means the index's reaction to a rename or deletion can be unit-tested without
//! spinning up a real OS watcher — see `FileIndex::apply_watch_event` and its
//! tests in `index.rs`.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Result, VfsError};

/// A single filesystem change, already classified and reduced to the path(s)
/// it concerns. Paths are absolute (as delivered by `notify`); callers that
/// need a mount-relative path strip the mount root themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    RenamedOld(PathBuf),
    RenamedNew(PathBuf),
}

/// Classifies a raw `notify` event into zero or more [`WatchEvent`]s. A rename
/// reported as one `RenameMode::Both` event (common on platforms that can pair
/// the two sides atomically) becomes both a `RenamedOld` and a `RenamedNew`.
pub fn classify(event: &Event) -> Vec<WatchEvent> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(WatchEvent::Added).collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(WatchEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [old, new] => vec![WatchEvent::RenamedOld(old.clone()), WatchEvent::RenamedNew(new.clone())],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().cloned().map(WatchEvent::RenamedOld).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().cloned().map(WatchEvent::RenamedNew).collect()
        }
        EventKind::Modify(_) => event.paths.iter().cloned().map(WatchEvent::Modified).collect(),
        _ => Vec::new(),
    }
}

/// Owns a `notify` watcher for a single mount root and the channel its event
/// handler feeds. Dropping this drops the watcher, which unregisters it.
pub struct MountWatcher {
    _watcher: RecommendedWatcher,
    events: crossbeam_channel::Receiver<WatchEvent>,
}

impl MountWatcher {
    /// Starts a recursive watch on `root`. The watcher runs on a thread owned
    /// by the `notify` backend; classified events are pushed onto a bounded
    /// channel drained by [`Self::drain`].
    pub fn spawn(root: &Path) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(1024);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(%err, "filesystem watcher error");
                    return;
                }
            };
            for watch_event in classify(&event) {
                if tx.send(watch_event).is_err() {
                    break; // receiver (the Filesystem) was dropped.
                }
            }
        })
        .map_err(|e| VfsError::Format(format!("failed to start filesystem watcher: {e}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| VfsError::Format(format!("failed to watch {}: {e}", root.display())))?;

        Ok(Self { _watcher: watcher, events: rx })
    }

    /// Drains every event queued so far without blocking.
    pub fn drain(&self) -> Vec<WatchEvent> {
        self.events.try_iter().collect()
    }
}
