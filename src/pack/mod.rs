//! Nesting a copied tree under its own name inside a destination directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::copy::{self, CopyOptions, Filter};
use crate::error::CopyError;

/// Copy directory `src` into `dst`, so that `dst` afterwards contains a new
/// directory named like `src`.
///
/// Fails if `dst/<name of src>` already exists or if `dst` lies inside `src`.
/// Returns the path of the new directory.
pub fn copy_tree(
    dst: impl AsRef<Path>,
    src: impl AsRef<Path>,
    opts: &CopyOptions,
    filter: Option<Filter<'_>>,
) -> Result<PathBuf, CopyError> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    copy::check_not_nested(dst, src)?;
    let nested = dst.join(base_name(src)?);

    fs::create_dir(&nested).map_err(|source| CopyError::CreateDir {
        path: nested.clone(),
        source,
    })?;
    copy::copy_recursive(&nested, src, opts, filter)?;

    Ok(nested)
}

// `.` and `..` carry no name of their own; use the directory they point to.
fn base_name(src: &Path) -> Result<PathBuf, CopyError> {
    if let Some(name) = src.file_name() {
        return Ok(PathBuf::from(name));
    }
    let resolved = fs::canonicalize(src).map_err(|source| CopyError::Open {
        path: src.to_path_buf(),
        source,
    })?;
    resolved
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| CopyError::Open {
            path: src.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "source has no base name"),
        })
}
