use std::collections::BTreeSet;
use std::path::PathBuf;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::events::ControlEvent;
use crate::list::ImageList;

/// Watch `dirs` (non-recursively) and forward file changes as
/// [`ControlEvent::FileChanged`]. The watcher stops when dropped.
pub fn start_watcher(
    dirs: &[PathBuf],
    tx: Sender<ControlEvent>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => handle_event(event, &tx),
        Err(err) => warn!("watch error: {err}"),
    })?;
    for dir in dirs {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(watching = %dir.display(), "notify watcher initialized");
    }
    Ok(watcher)
}

/// Distinct directories holding the listed files.
pub fn watch_dirs(list: &ImageList) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = list
        .iter()
        .map(|(_, entry)| match entry.dir() {
            d if d.as_os_str().is_empty() => PathBuf::from("."),
            d => d.to_path_buf(),
        })
        .filter(|d| d.is_dir())
        .collect();
    dirs.into_iter().collect()
}

fn handle_event(event: Event, tx: &Sender<ControlEvent>) {
    let relevant = matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(
                ModifyKind::Data(_) | ModifyKind::Name(RenameMode::To) | ModifyKind::Any
            )
            | EventKind::Remove(RemoveKind::File | RemoveKind::Any)
    );
    if !relevant {
        return;
    }
    for path in event.paths {
        debug!(kind = ?event.kind, path = %path.display(), "file changed");
        if tx.blocking_send(ControlEvent::FileChanged(path)).is_err() {
            return;
        }
    }
}
