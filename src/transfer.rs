//! Copy and delete helpers with progress reporting
//!
//! - [`copy_with_progress`] streams a file in 1 MiB chunks and reports a
//!   percentage after every chunk.
//! - [`copy_tree`] copies a directory file by file (used for the pre-restore
//!   snapshot).
//! - [`delete_tree`] deletes a directory file by file, tolerating files that
//!   cannot be removed, then removes the directory itself.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::{ProfileError, ProfileResult};
use crate::progress::{ProgressEvent, ProgressSink};

/// Chunk size for streamed copies
pub const COPY_CHUNK_SIZE: usize = 1024 * 1024;

const MIB: u64 = 1024 * 1024;

/// Copy `src` to `dst`, reporting progress after every chunk
///
/// Cancellation is checked before each chunk write, so a chunk that is
/// already being written completes first. The partially written destination
/// is left for the caller to remove. Returns the number of bytes copied.
pub fn copy_with_progress(
    src: &Path,
    dst: &Path,
    status: &str,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ProfileResult<u64> {
    let mut source = File::open(src)
        .map_err(|e| ProfileError::Io(format!("Failed to open {}: {}", src.display(), e)))?;
    let total = source
        .metadata()
        .map_err(|e| ProfileError::Io(format!("Failed to stat {}: {}", src.display(), e)))?
        .len();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ProfileError::Io(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let mut dest = File::create(dst)
        .map_err(|e| ProfileError::Io(format!("Failed to create {}: {}", dst.display(), e)))?;

    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    let mut copied: u64 = 0;

    loop {
        let read = source
            .read(&mut buffer)
            .map_err(|e| ProfileError::Io(format!("Failed to read {}: {}", src.display(), e)))?;
        if read == 0 {
            break;
        }

        cancel.check()?;

        dest.write_all(&buffer[..read])
            .map_err(|e| ProfileError::Io(format!("Failed to write {}: {}", dst.display(), e)))?;
        copied += read as u64;

        let percent = if total == 0 { 100 } else { copied * 100 / total };
        progress.report(ProgressEvent::determinate(
            status,
            percent,
            100,
            format!("{} MB / {} MB", copied / MIB, total / MIB),
        ));
    }

    dest.flush()
        .map_err(|e| ProfileError::Io(format!("Failed to flush {}: {}", dst.display(), e)))?;

    Ok(copied)
}

/// Files found below a root, plus the entries the walk could not read
#[derive(Debug, Default)]
pub struct FileListing {
    pub files: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Recursively list the files below `root`, sorted by path
///
/// Symlinks that do not point at a directory are listed as files, the way
/// a profile folder lists them. Unreadable entries go to `errors`.
pub fn list_files(root: &Path) -> FileListing {
    let mut listing = FileListing::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_file()
                    || (entry.path_is_symlink() && !entry.path().is_dir());
                if is_file {
                    listing.files.push(entry.into_path());
                }
            }
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                listing.errors.push((path, e.to_string()));
            }
        }
    }
    listing
}

/// Outcome of a [`copy_tree`] run
#[derive(Debug, Default)]
pub struct CopyReport {
    pub files_copied: usize,
    pub bytes_copied: u64,
}

/// Copy every file below `src` into `dst`, preserving relative paths
///
/// Any failure aborts the copy: a partial snapshot is not a usable one.
pub fn copy_tree(
    src: &Path,
    dst: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ProfileResult<CopyReport> {
    let listing = list_files(src);
    if let Some((path, reason)) = listing.errors.first() {
        return Err(ProfileError::Io(format!(
            "Failed to read {}: {}",
            path.display(),
            reason
        )));
    }
    let files = listing.files;
    let total = files.len() as u64;
    let mut report = CopyReport::default();

    fs::create_dir_all(dst)
        .map_err(|e| ProfileError::Io(format!("Failed to create {}: {}", dst.display(), e)))?;

    for (index, file) in files.iter().enumerate() {
        cancel.check()?;

        let relative = file.strip_prefix(src).unwrap_or(file);
        let target = dst.join(relative);
        progress.report(ProgressEvent::determinate(
            "Saving current profile...",
            index as u64 + 1,
            total,
            relative.display().to_string(),
        ));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProfileError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        report.bytes_copied += fs::copy(file, &target).map_err(|e| {
            ProfileError::Io(format!("Failed to copy {}: {}", file.display(), e))
        })?;
        report.files_copied += 1;
    }

    Ok(report)
}

/// Outcome of a [`delete_tree`] run
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Number of files found under the root
    pub files_total: usize,
    /// Number of files removed
    pub files_deleted: usize,
    /// Files that could not be removed, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

/// Delete every file below `path`, then remove the directory tree
///
/// Per-file failures are collected in the report and do not stop the walk.
/// A failure of the final directory removal is returned as an error naming
/// how many files were left behind.
pub fn delete_tree(
    path: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ProfileResult<DeleteReport> {
    let FileListing { files, errors } = list_files(path);
    let total = files.len();
    let mut report = DeleteReport {
        files_total: total,
        failures: errors,
        ..DeleteReport::default()
    };

    for (index, file) in files.iter().enumerate() {
        cancel.check()?;

        progress.report(ProgressEvent::determinate(
            "Deleting files...",
            index as u64 + 1,
            total as u64,
            file.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        ));

        match fs::remove_file(file) {
            Ok(()) => report.files_deleted += 1,
            Err(e) => report.failures.push((file.clone(), e.to_string())),
        }
    }

    fs::remove_dir_all(path).map_err(|e| {
        ProfileError::Io(format!(
            "Failed to remove directory {}: {} ({} file(s) could not be deleted)",
            path.display(),
            e,
            report.failures.len()
        ))
    })?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoProgress, ProgressLog};
    use tempfile::TempDir;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("sub/b.txt"), "beta").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), "gamma").unwrap();
    }

    #[test]
    fn test_copy_reports_percentages() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("big.bin");
        let data = vec![7u8; COPY_CHUNK_SIZE * 2 + 10];
        fs::write(&src, &data).unwrap();
        let dst = temp.path().join("out/big.bin");

        let log = ProgressLog::new();
        let copied =
            copy_with_progress(&src, &dst, "Copying", &log, &CancellationToken::new()).unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(fs::read(&dst).unwrap(), data);

        let positions: Vec<_> = log.events().iter().filter_map(|e| e.position()).collect();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], (49, 100));
        assert_eq!(positions[2], (100, 100));
    }

    #[test]
    fn test_copy_cancelled_before_write() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("f.bin");
        fs::write(&src, vec![1u8; 100]).unwrap();
        let dst = temp.path().join("g.bin");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = copy_with_progress(&src, &dst, "Copying", &NoProgress, &cancel).unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(fs::metadata(&dst).unwrap().len(), 0);
    }

    #[test]
    fn test_list_files_recursive() {
        let temp = TempDir::new().unwrap();
        write_tree(temp.path());
        fs::create_dir_all(temp.path().join("empty")).unwrap();

        let listing = list_files(temp.path());
        assert_eq!(listing.files.len(), 3);
        assert!(listing.files.iter().all(|f| f.is_file()));
        assert!(listing.errors.is_empty());
    }

    #[test]
    fn test_list_files_reports_walk_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        let listing = list_files(&missing);
        assert!(listing.files.is_empty());
        assert_eq!(listing.errors.len(), 1);
        assert_eq!(listing.errors[0].0, missing);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_files_includes_file_symlinks() {
        let temp = TempDir::new().unwrap();
        write_tree(temp.path());
        std::os::unix::fs::symlink(temp.path().join("a.txt"), temp.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(temp.path().join("sub"), temp.path().join("linkdir")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("dangling"))
            .unwrap();

        let listing = list_files(temp.path());
        let names: Vec<_> = listing
            .files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "dangling", "link.txt", "b.txt", "c.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_fails_on_unreadable_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write_tree(&src);
        std::os::unix::fs::symlink(src.join("gone"), src.join("dangling")).unwrap();

        let dst = temp.path().join("snapshot");
        let err = copy_tree(&src, &dst, &NoProgress, &CancellationToken::new()).unwrap_err();
        assert!(err.to_string().contains("dangling"));
    }

    #[test]
    fn test_copy_tree_preserves_layout() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write_tree(&src);
        let dst = temp.path().join("snapshot");

        let report = copy_tree(&src, &dst, &NoProgress, &CancellationToken::new()).unwrap();

        assert_eq!(report.files_copied, 3);
        assert_eq!(fs::read_to_string(dst.join("sub/deeper/c.txt")).unwrap(), "gamma");
    }

    #[test]
    fn test_delete_tree_removes_everything() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("profile");
        write_tree(&root);

        let log = ProgressLog::new();
        let report = delete_tree(&root, &log, &CancellationToken::new()).unwrap();

        assert_eq!(report.files_total, 3);
        assert_eq!(report.files_deleted, 3);
        assert!(report.failures.is_empty());
        assert!(!root.exists());
        assert_eq!(log.events().len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_tree_with_undeletable_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("profile");
        write_tree(&root);
        let locked_dir = root.join("locked");
        fs::create_dir_all(&locked_dir).unwrap();
        fs::write(locked_dir.join("held.db"), "x").unwrap();
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o555)).unwrap();

        let result = delete_tree(&root, &NoProgress, &CancellationToken::new());

        // Every other file is gone whether or not the locked one could be removed
        assert!(!root.join("a.txt").exists());
        assert!(!root.join("sub/b.txt").exists());
        match result {
            // Running as root ignores directory permissions
            Ok(report) => {
                assert!(report.failures.is_empty());
                assert!(!root.exists());
            }
            Err(err) => {
                assert!(err.to_string().contains("1 file(s) could not be deleted"));
                fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();
            }
        }
    }

    #[test]
    fn test_delete_tree_cancelled() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("profile");
        write_tree(&root);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = delete_tree(&root, &NoProgress, &cancel).unwrap_err();

        assert!(err.is_cancelled());
        assert!(root.join("a.txt").exists());
    }
}
