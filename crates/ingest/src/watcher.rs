use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Watch `watch_dir` for new files and forward their paths into `tx`.
///
/// The returned watcher must be kept alive for as long as events are wanted.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths.into_iter().filter(|p| is_intake_file(p)) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("Intake queue full or closed, file will be picked up on next run");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Intake watcher error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Files already waiting in the intake folder, sorted by name.
pub fn pending_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_intake_file(&entry.path()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Hidden files and editor or download temporaries are ignored.
fn is_intake_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.') && !name.ends_with('~') && !name.ends_with(".part") && !name.ends_with(".tmp")
}
