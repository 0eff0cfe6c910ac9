//! Target enumeration

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::events::{Event, EventSink, Severity, Subject};

/// Lists regular files under `root` in a stable order.
///
/// Symlinks are not followed. Unreadable entries are reported and skipped;
/// the walk continues with the remaining entries.
pub fn discover_files(root: &Path, sink: &dyn EventSink) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                sink.emit(Event::new(
                    Severity::Warn,
                    Subject::Path(path),
                    format!("traversal error: {e}"),
                ));
            }
        }
    }

    files
}
