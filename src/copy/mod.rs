//! File and directory-tree copying.
//!
//! The copiers are layered: [`copy_recursive`] walks a source directory and
//! hands every regular file to the fanout copier ([`copy_to_dir`]), which in
//! turn copies each file with [`copy_file`]. Failures stop the operation at
//! the first error and leave everything copied so far in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::CopyError;
use crate::ui;

/// Inclusion test applied to every traversed entry: `(containing_dir, entry)`.
pub type Filter<'a> = &'a dyn Fn(&Path, &EntryInfo) -> bool;

/// What to do when reading a directory listing fails part way through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingPolicy {
    /// Warn and treat the listing as exhausted.
    #[default]
    Truncate,
    /// Abort the copy with [`CopyError::ReadDir`].
    Fail,
}

/// Per-OS file name patterns, e.g. `windows = "{}.exe"`.
///
/// When the running OS has an entry, `{}` in its pattern is replaced by the
/// source path before the file is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsDepNames(BTreeMap<String, String>);

impl OsDepNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executable naming: `.exe` suffix on Windows, unchanged elsewhere.
    pub fn executables() -> Self {
        let mut names = Self::new();
        names.insert("windows", "{}.exe");
        names
    }

    pub fn insert(&mut self, os: impl Into<String>, pattern: impl Into<String>) {
        self.0.insert(os.into(), pattern.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrite `path` for the running OS.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.resolve_for(std::env::consts::OS, path)
    }

    pub fn resolve_for(&self, os: &str, path: &Path) -> PathBuf {
        let Some(pattern) = self.0.get(os) else {
            return path.to_path_buf();
        };
        let Some((prefix, suffix)) = pattern.split_once("{}") else {
            return path.to_path_buf();
        };
        let mut resolved = OsString::from(prefix);
        resolved.push(path.as_os_str());
        resolved.push(suffix);
        PathBuf::from(resolved)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub os_names: OsDepNames,
    pub listing: ListingPolicy,
    /// Also carry over the modification time of each copied file.
    pub preserve_mtime: bool,
}

/// Metadata of one directory entry as seen during traversal.
///
/// Built from the entry itself, so a symlink is reported as a symlink and
/// never as its target.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    name: OsString,
    file_type: fs::FileType,
    mode: u32,
    len: u64,
    modified: Option<SystemTime>,
}

impl EntryInfo {
    /// Describe `path` without following a final symlink.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        let name = path
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_else(|| path.as_os_str().to_os_string());
        Ok(Self::from_metadata(name, &meta))
    }

    pub fn from_metadata(name: OsString, meta: &fs::Metadata) -> Self {
        EntryInfo {
            name,
            file_type: meta.file_type(),
            mode: mode_bits(meta),
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }

    pub fn name(&self) -> &OsStr {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.file_type.is_file()
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
}

#[cfg(unix)]
pub(crate) fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
pub(crate) fn mode_bits(meta: &fs::Metadata) -> u32 {
    let base = if meta.is_dir() { 0o755 } else { 0o644 };
    if meta.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Naming {
    OsDependent,
    Verbatim,
}

/// Copy `src` to `dst`, then give `dst` the permission bits of `src`.
///
/// `dst` is created or truncated. If the byte stream fails part way the
/// destination is left as written so far.
pub fn copy_file(
    dst: impl AsRef<Path>,
    src: impl AsRef<Path>,
    opts: &CopyOptions,
) -> Result<(), CopyError> {
    let src = opts.os_names.resolve(src.as_ref());
    copy_file_verbatim(dst.as_ref(), &src, opts)
}

fn copy_file_verbatim(dst: &Path, src: &Path, opts: &CopyOptions) -> Result<(), CopyError> {
    // Checked before opening: opening a FIFO for reading blocks.
    let meta = fs::metadata(src).map_err(|source| CopyError::Open {
        path: src.to_path_buf(),
        source,
    })?;
    if !meta.is_file() {
        return Err(CopyError::Open {
            path: src.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    let mut reader = File::open(src).map_err(|source| CopyError::Open {
        path: src.to_path_buf(),
        source,
    })?;

    make_writable(dst)?;
    {
        let mut writer = File::create(dst).map_err(|source| CopyError::Create {
            path: dst.to_path_buf(),
            source,
        })?;
        ui::step(&format!("copy '{}' → '{}'", src.display(), dst.display()));
        io::copy(&mut reader, &mut writer).map_err(|source| CopyError::Stream {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source,
        })?;
        writer
            .set_permissions(meta.permissions())
            .map_err(|source| CopyError::Metadata {
                path: dst.to_path_buf(),
                source,
            })?;
    }

    if opts.preserve_mtime {
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        filetime::set_file_mtime(dst, mtime).map_err(|source| CopyError::Metadata {
            path: dst.to_path_buf(),
            source,
        })?;
    }

    Ok(())
}

// A previous copy of a read-only source leaves a read-only destination,
// which would make the next truncate fail.
fn make_writable(dst: &Path) -> Result<(), CopyError> {
    let meta = match fs::symlink_metadata(dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(CopyError::Metadata {
                path: dst.to_path_buf(),
                source,
            })
        }
    };
    if !meta.is_file() || !meta.permissions().readonly() {
        return Ok(());
    }
    let mut perms = meta.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(dst, perms).map_err(|source| CopyError::Metadata {
        path: dst.to_path_buf(),
        source,
    })
}

/// Copy every file in `files` into the directory `dst` under its base name.
///
/// Files are copied in order; the first failure is returned and files copied
/// before it stay in place.
pub fn copy_to_dir<P: AsRef<Path>>(
    dst: impl AsRef<Path>,
    files: &[P],
    opts: &CopyOptions,
) -> Result<(), CopyError> {
    fanout(dst.as_ref(), files, opts, Naming::OsDependent)
}

fn fanout<P: AsRef<Path>>(
    dst: &Path,
    files: &[P],
    opts: &CopyOptions,
    naming: Naming,
) -> Result<(), CopyError> {
    for file in files {
        let src = match naming {
            Naming::OsDependent => opts.os_names.resolve(file.as_ref()),
            Naming::Verbatim => file.as_ref().to_path_buf(),
        };
        let name = src.file_name().ok_or_else(|| CopyError::Open {
            path: src.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })?;
        copy_file_verbatim(&dst.join(name), &src, opts)?;
    }
    Ok(())
}

/// Copy the contents of directory `src` into the existing directory `dst`.
///
/// Entries are read one at a time. An entry for which `filter` returns false
/// is skipped together with its subtree. Anything that is neither a directory
/// nor a regular file aborts the copy with [`CopyError::Irregular`]. A `dst`
/// inside `src` is rejected with [`CopyError::Nested`] before anything is
/// written.
pub fn copy_recursive(
    dst: impl AsRef<Path>,
    src: impl AsRef<Path>,
    opts: &CopyOptions,
    filter: Option<Filter<'_>>,
) -> Result<(), CopyError> {
    let dst = dst.as_ref();
    let src = src.as_ref();

    check_not_nested(dst, src)?;
    walk(dst, src, opts, filter)
}

/// Fail if `dst` is `src` or lies below it.
///
/// Paths that cannot be resolved are let through; the copy itself reports
/// them when it tries to read or create them.
pub(crate) fn check_not_nested(dst: &Path, src: &Path) -> Result<(), CopyError> {
    let (Ok(dst_abs), Ok(src_abs)) = (fs::canonicalize(dst), fs::canonicalize(src)) else {
        return Ok(());
    };
    if dst_abs.starts_with(&src_abs) {
        return Err(CopyError::Nested {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }
    Ok(())
}

fn walk(
    dst: &Path,
    src: &Path,
    opts: &CopyOptions,
    filter: Option<Filter<'_>>,
) -> Result<(), CopyError> {
    let entries = fs::read_dir(src).map_err(|source| CopyError::Open {
        path: src.to_path_buf(),
        source,
    })?;
    copy_listing(
        dst,
        src,
        entries.map(|entry| entry.map(|entry| entry.path())),
        opts,
        filter,
    )
}

fn copy_listing(
    dst: &Path,
    src: &Path,
    listing: impl Iterator<Item = io::Result<PathBuf>>,
    opts: &CopyOptions,
    filter: Option<Filter<'_>>,
) -> Result<(), CopyError> {
    for entry in listing {
        let path = match entry {
            Ok(path) => path,
            Err(source) => match opts.listing {
                ListingPolicy::Truncate => {
                    ui::warn(&format!(
                        "read directory '{}': {} (remaining entries skipped)",
                        src.display(),
                        source
                    ));
                    break;
                }
                ListingPolicy::Fail => {
                    return Err(CopyError::ReadDir {
                        path: src.to_path_buf(),
                        source,
                    })
                }
            },
        };

        let info = EntryInfo::from_path(&path).map_err(|source| CopyError::Metadata {
            path: path.clone(),
            source,
        })?;

        if let Some(filter) = filter {
            if !filter(src, &info) {
                continue;
            }
        }

        if info.is_dir() {
            let sub_dst = dst.join(info.name());
            fs::create_dir(&sub_dst).map_err(|source| CopyError::CreateDir {
                path: sub_dst.clone(),
                source,
            })?;
            walk(&sub_dst, &path, opts, filter)?;
        } else if info.is_file() {
            fanout(dst, &[&path], opts, Naming::Verbatim)?;
        } else {
            return Err(CopyError::Irregular { path });
        }
    }

    Ok(())
}
