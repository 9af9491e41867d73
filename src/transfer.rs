//! Move files into place without ever overwriting an existing file.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::console::Logger;
use crate::types::TransferOutcome;

type RenameFn = fn(&Path, &Path) -> io::Result<()>;
type CopyFn = fn(&Path, &Path) -> io::Result<u64>;

/// Moves files with a fallback for targets on another filesystem.
///
/// When a plain rename crosses a filesystem boundary the file is first renamed in place.
/// With copying enabled, the renamed file is then copied to the target
/// and the original moved to the archive directory next to it.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    copy_across_filesystems: bool,
    archive_dir: String,
    rename: RenameFn,
    copy: CopyFn,
}

impl FileTransfer {
    #[must_use]
    pub fn new(copy_across_filesystems: bool, archive_dir: impl Into<String>) -> Self {
        Self {
            copy_across_filesystems,
            archive_dir: archive_dir.into(),
            rename: rename_file,
            copy: copy_file,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_file_operations(mut self, rename: RenameFn, copy: CopyFn) -> Self {
        self.rename = rename;
        self.copy = copy;
        self
    }

    /// Move `source` to `target`.
    ///
    /// Errors are reported in the returned outcome; the file stays at its last successful location.
    pub fn transfer(&self, source: &Path, target: &Path, log: &Logger) -> TransferOutcome {
        if source == target {
            log.verbose("Source and target are the same file");
            return TransferOutcome::Skipped;
        }
        if target.exists() {
            log.warning(&format!("Target file already exists: {}", target.display()));
            return TransferOutcome::Skipped;
        }
        if let Some(parent) = target.parent()
            && let Err(error) = fs::create_dir_all(parent)
        {
            return failed(log, format!("Failed to create directory {}: {error}", parent.display()));
        }

        match (self.rename)(source, target) {
            Ok(()) => {
                log.verbose(&format!("Moved: {}", target.display()));
                TransferOutcome::Moved(target.to_path_buf())
            }
            Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
                self.transfer_across_filesystems(source, target, log)
            }
            Err(error) => failed(log, format!("Failed to move {}: {error}", source.display())),
        }
    }

    fn transfer_across_filesystems(&self, source: &Path, target: &Path, log: &Logger) -> TransferOutcome {
        log.warning("Target is on a different filesystem, renaming file in place");
        let (Some(source_dir), Some(file_name)) = (source.parent(), target.file_name()) else {
            return failed(log, format!("Invalid path: {}", target.display()));
        };

        let in_place = unique_path(&source_dir.join(file_name), source);
        if in_place != source {
            if let Err(error) = (self.rename)(source, &in_place) {
                return failed(log, format!("Failed to rename {} in place: {error}", source.display()));
            }
            log.info(&format!("Renamed in place: {}", in_place.display()));
        }
        if !self.copy_across_filesystems {
            return TransferOutcome::RenamedInPlace(in_place);
        }

        if let Err(error) = self.copy_to_target(&in_place, target) {
            return failed(log, format!("Failed to copy {}: {error}", in_place.display()));
        }
        log.info(&format!("Copied: {}", target.display()));

        let archive_dir = source_dir.join(&self.archive_dir);
        let archive_path = unique_path(&archive_dir.join(file_name), source);
        let archived = fs::create_dir_all(&archive_dir).and_then(|()| (self.rename)(&in_place, &archive_path));
        if let Err(error) = archived {
            // Keep a single copy of the file at its renamed location.
            if let Err(remove_error) = fs::remove_file(target) {
                log.error(&format!("Failed to remove copy {}: {remove_error}", target.display()));
            }
            return failed(log, format!("Failed to archive {}: {error}", in_place.display()));
        }
        log.verbose(&format!("Archived: {}", archive_path.display()));
        TransferOutcome::Moved(target.to_path_buf())
    }

    /// Copy through a `.part` file next to the target. A failed copy leaves nothing at the target.
    fn copy_to_target(&self, source: &Path, target: &Path) -> io::Result<()> {
        let partial = partial_path(target);
        let result = (self.copy)(source, &partial).and_then(|_| {
            if target.exists() {
                Err(io::Error::from(io::ErrorKind::AlreadyExists))
            } else {
                fs::rename(&partial, target)
            }
        });
        if result.is_err() && partial.exists() {
            let _ = fs::remove_file(&partial);
        }
        result
    }
}

fn rename_file(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

pub(crate) fn copy_file(from: &Path, to: &Path) -> io::Result<u64> {
    fs::copy(from, to)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Add a `_N` suffix until the path is free. The file being moved does not count as taken.
fn unique_path(path: &Path, current: &Path) -> PathBuf {
    let mut candidate = path.to_path_buf();
    let mut counter = 1;
    while candidate != current && candidate.exists() {
        candidate = crate::insert_suffix_before_extension(path, &format!("_{counter}"));
        counter += 1;
    }
    candidate
}

fn failed(log: &Logger, message: String) -> TransferOutcome {
    log.error(&message);
    TransferOutcome::Failed(message)
}
