//! Zip archive creation for a prepared distribution directory.
//!
//! Every regular file below the distribution directory becomes one entry named
//! `<dist-name>/<relative path>`, so extracting the archive yields a single
//! top-level folder. Directories are implied by the entry names.

use chrono::{Datelike, Local, Timelike};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use std::time::SystemTime;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::copy::mode_bits;
use crate::error::{ArchiveError, CopyError};
use crate::ui;

/// Totals for one archive build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub file_count: usize,
    /// Uncompressed bytes written.
    pub size_bytes: u64,
}

/// Create `archive` from the contents of `dist_dir`, rooted at `dist_name`.
///
/// The walk is anchored at `dist_dir` itself; the process working directory is
/// not changed. The archive file is finalized before returning, and an archive
/// placed inside `dist_dir` is not added to itself.
pub fn zip_dist(
    archive: impl AsRef<Path>,
    dist_name: &str,
    dist_dir: impl AsRef<Path>,
) -> Result<ArchiveSummary, ArchiveError> {
    let archive = archive.as_ref();
    let dist_dir = dist_dir.as_ref();

    validate_dist_name(dist_name)?;
    if !dist_dir.is_dir() {
        return Err(ArchiveError::NotADirectory(dist_dir.to_path_buf()));
    }

    let file = File::create(archive).map_err(|source| CopyError::Create {
        path: archive.to_path_buf(),
        source,
    })?;
    let archive_abs = fs::canonicalize(archive).ok();
    let mut zip = ZipWriter::new(file);
    let mut summary = ArchiveSummary::default();

    for entry in WalkDir::new(dist_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| ArchiveError::Walk {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dist_dir.to_path_buf()),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            return Err(CopyError::Irregular {
                path: path.to_path_buf(),
            }
            .into());
        }
        if is_same_file(path, archive, archive_abs.as_deref()) {
            continue;
        }

        let relative = path.strip_prefix(dist_dir).unwrap_or(path);
        let name = entry_name(dist_name, relative);
        let meta = entry.metadata().map_err(|source| ArchiveError::Walk {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = File::open(path).map_err(|source| CopyError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        zip.start_file(name.as_str(), header_options(&meta))
            .map_err(|source| ArchiveError::Zip {
                name: name.clone(),
                source,
            })?;
        ui::step(&format!("add '{}' → '{}'", path.display(), name));
        let written = io::copy(&mut reader, &mut zip).map_err(|source| CopyError::Stream {
            src: path.to_path_buf(),
            dst: archive.to_path_buf(),
            source,
        })?;

        summary.file_count += 1;
        summary.size_bytes += written;
    }

    zip.finish().map_err(|source| ArchiveError::Finish {
        path: archive.to_path_buf(),
        source,
    })?;

    Ok(summary)
}

fn validate_dist_name(dist_name: &str) -> Result<(), ArchiveError> {
    let path = Path::new(dist_name);
    let valid = !dist_name.trim().is_empty()
        && !dist_name.contains('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(ArchiveError::InvalidDistName(dist_name.to_string()))
    }
}

/// `dist_name` joined with the components of `relative`, always `/`-separated.
pub fn entry_name(dist_name: &str, relative: &Path) -> String {
    let mut name = dist_name.trim_end_matches('/').to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push('/');
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}

fn header_options(meta: &fs::Metadata) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode_bits(meta) & 0o777)
        .large_file(meta.len() >= u64::from(u32::MAX));

    match meta.modified().ok().and_then(zip_time) {
        Some(modified) => options.last_modified_time(modified),
        None => options,
    }
}

// Zip timestamps are local MS-DOS times and cannot represent years before 1980.
fn zip_time(time: SystemTime) -> Option<zip::DateTime> {
    let local: chrono::DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

fn is_same_file(path: &Path, archive: &Path, archive_abs: Option<&Path>) -> bool {
    if path.file_name() != archive.file_name() {
        return false;
    }
    match (archive_abs, fs::canonicalize(path)) {
        (Some(archive_abs), Ok(resolved)) => resolved == archive_abs,
        _ => false,
    }
}

/// Count regular files and their total size below `dir`.
pub fn count_files_and_size(dir: &Path) -> Result<(usize, u64), ArchiveError> {
    let mut count = 0;
    let mut size = 0u64;

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| ArchiveError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            count += 1;
            size += entry
                .metadata()
                .map_err(|source| ArchiveError::Walk {
                    path: entry.path().to_path_buf(),
                    source,
                })?
                .len();
        }
    }

    Ok((count, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn read_archive(path: &Path) -> BTreeMap<String, String> {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut contents = BTreeMap::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).unwrap();
            let mut text = String::new();
            file.read_to_string(&mut text).unwrap();
            contents.insert(file.name().to_string(), text);
        }
        contents
    }

    fn dist_dir(root: &Path) -> PathBuf {
        let dist = root.join("dist");
        fs::create_dir_all(dist.join("sub")).unwrap();
        fs::write(dist.join("a.txt"), "alpha").unwrap();
        fs::write(dist.join("sub/b.txt"), "beta").unwrap();
        dist
    }

    #[test]
    fn test_zip_dist_round_trip() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        let archive = temp.path().join("myapp-1.0.zip");

        let summary = zip_dist(&archive, "myapp-1.0", &dist).unwrap();

        assert_eq!(
            summary,
            ArchiveSummary {
                file_count: 2,
                size_bytes: 9
            }
        );
        let contents = read_archive(&archive);
        assert_eq!(
            contents,
            BTreeMap::from([
                ("myapp-1.0/a.txt".to_string(), "alpha".to_string()),
                ("myapp-1.0/sub/b.txt".to_string(), "beta".to_string()),
            ])
        );
    }

    #[test]
    fn test_zip_dist_does_not_touch_working_directory() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        let before = std::env::current_dir().unwrap();

        zip_dist(temp.path().join("out.zip"), "app", &dist).unwrap();

        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_dist_keeps_unix_mode() {
        use std::os::unix::fs::PermissionsExt;

        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        fs::write(dist.join("run.sh"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(dist.join("run.sh"), fs::Permissions::from_mode(0o750)).unwrap();
        let archive = temp.path().join("out.zip");

        zip_dist(&archive, "app", &dist).unwrap();

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let entry = zip.by_name("app/run.sh").unwrap();
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o750));
    }

    #[test]
    fn test_zip_dist_skips_archive_inside_dist_dir() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        let archive = dist.join("self.zip");

        let summary = zip_dist(&archive, "app", &dist).unwrap();

        assert_eq!(summary.file_count, 2);
        assert!(!read_archive(&archive).contains_key("app/self.zip"));
    }

    #[test]
    fn test_zip_dist_empty_directory_is_valid_archive() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("empty");
        fs::create_dir_all(dist.join("nested")).unwrap();
        let archive = temp.path().join("empty.zip");

        let summary = zip_dist(&archive, "app", &dist).unwrap();

        assert_eq!(summary.file_count, 0);
        assert!(read_archive(&archive).is_empty());
    }

    #[test]
    fn test_zip_dist_rejects_bad_dist_names() {
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        let archive = temp.path().join("out.zip");

        for name in ["", "../escape", "/abs", "a\\b"] {
            let err = zip_dist(&archive, name, &dist).unwrap_err();
            assert!(matches!(err, ArchiveError::InvalidDistName(_)), "{name}");
        }
    }

    #[test]
    fn test_zip_dist_missing_dist_dir() {
        let temp = TempDir::new().unwrap();
        let err = zip_dist(temp.path().join("out.zip"), "app", temp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_dist_rejects_symlink() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        std::os::unix::fs::symlink(dist.join("a.txt"), dist.join("link")).unwrap();

        let err = zip_dist(temp.path().join("out.zip"), "app", &dist).unwrap_err();

        assert!(matches!(err, ArchiveError::Copy(CopyError::Irregular { .. })));
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(
            entry_name("myapp-1.0", Path::new("sub/b.txt")),
            "myapp-1.0/sub/b.txt"
        );
        assert_eq!(entry_name("myapp/", Path::new("a.txt")), "myapp/a.txt");
    }

    #[test]
    fn test_count_files_and_size() {
        let temp = TempDir::new().unwrap();
        let dist = dist_dir(temp.path());
        assert_eq!(count_files_and_size(&dist).unwrap(), (2, 9));
    }
}
