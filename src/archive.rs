//! Zip archive creation and extraction
//!
//! Both directions build the complete file (or entry) list first so progress
//! can be reported as "n of total", and both check the cancellation token
//! between items. Aborted runs leave their partial output in place; the
//! orchestrator decides what to clean up.

use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::cancel::CancellationToken;
use crate::error::{ProfileError, ProfileResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::transfer::{list_files, FileListing};

const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Outcome of [`create_archive`]
#[derive(Debug, Default)]
pub struct ArchiveReport {
    /// Files found under the source directory
    pub files_total: usize,
    /// Files written to the archive
    pub files_added: usize,
    /// Files that could not be archived, with the reason
    pub failures: Vec<(PathBuf, String)>,
    /// Size of the finished archive
    pub archive_size: u64,
}

impl ArchiveReport {
    /// Whether some files were skipped
    pub fn has_warnings(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Warning line for the progress display, if any file was skipped
    pub fn warning(&self) -> Option<String> {
        self.has_warnings().then(|| {
            format!(
                "{} of {} file(s) could not be archived",
                self.failures.len(),
                self.files_total
            )
        })
    }
}

/// Outcome of [`extract_archive`]
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Entries in the archive, directories included
    pub entries_total: usize,
    /// Files written to disk
    pub files_written: usize,
    /// Entries whose names would escape the destination
    pub skipped: Vec<String>,
}

/// Zip entry name for `file` relative to `root`, always with `/` separators
fn entry_name(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Pack every file below `source_dir` into a new zip at `archive_path`
///
/// A file that cannot be read (locked, permission denied) is skipped and
/// recorded in the report; the archive is still produced. Fails with
/// [`ProfileError::ArchiveWriteFailed`] if the result is missing or empty.
pub fn create_archive(
    source_dir: &Path,
    archive_path: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ProfileResult<ArchiveReport> {
    if !source_dir.is_dir() {
        return Err(ProfileError::SourceNotFound(source_dir.to_path_buf()));
    }

    let FileListing { files, errors } = list_files(source_dir);
    if files.is_empty() && errors.is_empty() {
        return Err(ProfileError::EmptyDirectory(source_dir.to_path_buf()));
    }

    if archive_path.exists() {
        fs::remove_file(archive_path).map_err(|e| {
            ProfileError::Io(format!(
                "Failed to remove existing archive {}: {}",
                archive_path.display(),
                e
            ))
        })?;
    }
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ProfileError::Io(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let file = File::create(archive_path).map_err(|e| {
        ProfileError::Io(format!(
            "Failed to create archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Unreadable directories count as failures, not as a silent omission
    let mut report = ArchiveReport {
        files_total: files.len() + errors.len(),
        failures: errors,
        ..ArchiveReport::default()
    };
    let total = files.len() as u64;

    for (index, path) in files.iter().enumerate() {
        cancel.check()?;

        let Some(name) = entry_name(source_dir, path) else {
            continue;
        };
        progress.report(ProgressEvent::determinate(
            "Compressing files...",
            index as u64 + 1,
            total,
            name.as_str(),
        ));

        if let Err(e) = add_file(&mut zip, path, &name, options) {
            report.failures.push((path.clone(), e.to_string()));
            continue;
        }
        report.files_added += 1;
    }

    zip.finish()
        .map_err(|e| ProfileError::ArchiveWriteFailed(format!("Failed to finalize zip: {}", e)))?;

    report.archive_size = verify_archive(archive_path)?;
    Ok(report)
}

fn add_file(
    zip: &mut ZipWriter<File>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> ProfileResult<()> {
    // Open first so a locked file is skipped before an entry is started
    let source = File::open(path)?;
    let size = source.metadata()?.len();
    write_entry(zip, source, name, options.large_file(size >= LARGE_FILE_THRESHOLD))
}

/// Write one entry; a read failure drops the entry instead of leaving it truncated
fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    mut source: impl Read,
    name: &str,
    options: SimpleFileOptions,
) -> ProfileResult<()> {
    zip.start_file(name, options)?;
    if let Err(e) = io::copy(&mut source, zip) {
        zip.abort_file()?;
        return Err(e.into());
    }
    Ok(())
}

/// Check that an archive exists and is not empty; returns its size
pub fn verify_archive(archive_path: &Path) -> ProfileResult<u64> {
    match fs::metadata(archive_path) {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(ProfileError::ArchiveWriteFailed(format!(
            "{} is empty",
            archive_path.display()
        ))),
        Err(_) => Err(ProfileError::ArchiveWriteFailed(format!(
            "{} was not created",
            archive_path.display()
        ))),
    }
}

/// Unpack every entry of `archive_path` into `dest_dir`
///
/// Directory entries are counted but not written; parent directories are
/// created as needed and existing files are overwritten. Entries whose
/// names would resolve outside `dest_dir` are skipped.
pub fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ProfileResult<ExtractReport> {
    let file = File::open(archive_path).map_err(|e| {
        ProfileError::Io(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    let mut archive = ZipArchive::new(file)?;

    let total = archive.len();
    let mut report = ExtractReport {
        entries_total: total,
        ..ExtractReport::default()
    };

    for index in 0..total {
        cancel.check()?;

        let mut entry = archive.by_index(index)?;
        let raw_name = entry.name().to_string();
        let display_name = raw_name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&raw_name)
            .to_string();
        progress.report(ProgressEvent::determinate(
            "Extracting files...",
            index as u64 + 1,
            total as u64,
            display_name,
        ));

        let Some(relative) = entry.enclosed_name() else {
            report.skipped.push(raw_name);
            continue;
        };
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                ProfileError::Io(format!("Failed to create {}: {}", target.display(), e))
            })?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProfileError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let mut out = File::create(&target).map_err(|e| {
            ProfileError::Io(format!("Failed to write {}: {}", target.display(), e))
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            ProfileError::Io(format!("Failed to extract {}: {}", raw_name, e))
        })?;
        report.files_written += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoProgress, ProgressLog};
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Yields `good` bytes, then fails
    struct BrokenReader {
        good: usize,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.good == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device lost"));
            }
            let n = self.good.min(buf.len());
            buf[..n].fill(b'x');
            self.good -= n;
            Ok(n)
        }
    }

    fn write_profile(root: &Path) -> Vec<(&'static str, Vec<u8>)> {
        let files: Vec<(&'static str, Vec<u8>)> = vec![
            ("profiles.ini", b"[core]\nDefaultProfile=default\n".to_vec()),
            ("default/QGIS/QGIS3.ini", b"[app]\nlocale=de\n".to_vec()),
            ("default/python/plugins/tool/__init__.py", b"def classFactory(i): pass\n".to_vec()),
            ("default/qgis.db", (0..=255u8).cycle().take(70_000).collect()),
        ];
        for (rel, data) in &files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        files
    }

    #[test]
    fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("profiles");
        let files = write_profile(&source);
        let archive = temp.path().join("share/user/backup.zip");

        let log = ProgressLog::new();
        let report = create_archive(&source, &archive, &log, &CancellationToken::new()).unwrap();
        assert_eq!(report.files_total, files.len());
        assert_eq!(report.files_added, files.len());
        assert!(report.warning().is_none());
        assert!(report.archive_size > 0);

        let ticks: Vec<_> = log.events().iter().filter_map(|e| e.position()).collect();
        assert_eq!(ticks.first(), Some(&(1, 4)));
        assert_eq!(ticks.last(), Some(&(4, 4)));

        let dest = temp.path().join("restored");
        let extracted =
            extract_archive(&archive, &dest, &NoProgress, &CancellationToken::new()).unwrap();
        assert_eq!(extracted.files_written, files.len());

        for (rel, data) in &files {
            assert_eq!(&fs::read(dest.join(rel)).unwrap(), data, "{}", rel);
        }
        assert_eq!(list_files(&dest).files.len(), files.len());
    }

    #[test]
    fn test_entry_names_use_forward_slashes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("profiles");
        write_profile(&source);
        let archive = temp.path().join("out.zip");

        create_archive(&source, &archive, &NoProgress, &CancellationToken::new()).unwrap();

        let zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<_> = zip.file_names().map(str::to_string).collect();
        assert!(names.contains(&"default/QGIS/QGIS3.ini".to_string()));
        assert!(names.iter().all(|n| !n.contains('\\')));
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = create_archive(
            &temp.path().join("missing"),
            &temp.path().join("a.zip"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::SourceNotFound(_)));
    }

    #[test]
    fn test_empty_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty");
        fs::create_dir_all(source.join("only/dirs")).unwrap();

        let err = create_archive(
            &source,
            &temp.path().join("a.zip"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::EmptyDirectory(_)));
        assert!(!temp.path().join("a.zip").exists());
    }

    #[test]
    fn test_existing_archive_replaced() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("profiles");
        write_profile(&source);
        let archive = temp.path().join("a.zip");
        fs::write(&archive, "stale, not a zip").unwrap();

        create_archive(&source, &archive, &NoProgress, &CancellationToken::new()).unwrap();
        assert_eq!(ZipArchive::new(File::open(&archive).unwrap()).unwrap().len(), 4);
    }

    #[test]
    fn test_failed_read_drops_entry() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        let err = write_entry(&mut zip, BrokenReader { good: 5000 }, "broken.db", options);
        assert!(err.is_err());
        write_entry(&mut zip, &b"fine"[..], "ok.ini", options).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, vec!["ok.ini"]);
        let mut contents = String::new();
        archive
            .by_name("ok.ini")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "fine");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("profiles");
        let files = write_profile(&source);
        std::os::unix::fs::symlink(source.join("gone.db"), source.join("default/locked.db"))
            .unwrap();
        let archive = temp.path().join("a.zip");

        let report = create_archive(&source, &archive, &NoProgress, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.files_total, files.len() + 1);
        assert_eq!(report.files_added, files.len());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].0.ends_with("default/locked.db"));
        assert_eq!(
            report.warning().as_deref(),
            Some("1 of 5 file(s) could not be archived")
        );

        let zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), files.len());
        assert!(zip.file_names().all(|n| n != "default/locked.db"));
    }

    #[test]
    fn test_cancel_mid_create() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("profiles");
        write_profile(&source);
        let archive = temp.path().join("a.zip");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let sink = move |event: ProgressEvent| {
            if event.position() == Some((2, 4)) {
                trigger.cancel();
            }
        };

        let err = create_archive(&source, &archive, &sink, &cancel).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_extract_counts_directories_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dirs.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            let options = SimpleFileOptions::default();
            zip.add_directory("default/", options).unwrap();
            zip.start_file("default/settings.ini", options).unwrap();
            zip.write_all(b"new").unwrap();
            zip.finish().unwrap();
        }

        let dest = temp.path().join("out");
        fs::create_dir_all(dest.join("default")).unwrap();
        fs::write(dest.join("default/settings.ini"), "old contents").unwrap();

        let log = ProgressLog::new();
        let report = extract_archive(&archive, &dest, &log, &CancellationToken::new()).unwrap();

        assert_eq!(report.entries_total, 2);
        assert_eq!(report.files_written, 1);
        assert_eq!(log.events().len(), 2);
        assert_eq!(fs::read_to_string(dest.join("default/settings.ini")).unwrap(), "new");
    }

    #[test]
    fn test_extract_skips_escaping_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            let options = SimpleFileOptions::default();
            zip.start_file("../escape.txt", options).unwrap();
            zip.write_all(b"x").unwrap();
            zip.start_file("ok.txt", options).unwrap();
            zip.write_all(b"y").unwrap();
            zip.finish().unwrap();
        }

        let dest = temp.path().join("out");
        let report =
            extract_archive(&archive, &dest, &NoProgress, &CancellationToken::new()).unwrap();

        assert_eq!(report.skipped, vec!["../escape.txt".to_string()]);
        assert!(!temp.path().join("escape.txt").exists());
        assert!(dest.join("ok.txt").exists());
    }

    #[test]
    fn test_verify_archive() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.zip");
        fs::write(&empty, "").unwrap();

        assert!(matches!(
            verify_archive(&empty),
            Err(ProfileError::ArchiveWriteFailed(_))
        ));
        assert!(matches!(
            verify_archive(&temp.path().join("missing.zip")),
            Err(ProfileError::ArchiveWriteFailed(_))
        ));
    }
}
