//! distpack - replicate directory trees and package them as zip distributions.
//!
//! This library provides:
//! - Single-file, fanout and recursive tree copying with per-entry filters
//! - Nesting a copied tree under its own name (`pack::copy_tree`)
//! - Zip archives rooted at a distribution name (`archive::zip_dist`)
//! - TOML packaging plans that drive all of the above

pub mod archive;
pub mod build;
pub mod cfg;
pub mod copy;
pub mod error;
pub mod filter;
pub mod pack;
pub mod ui;

pub use archive::{zip_dist, ArchiveSummary};
pub use copy::{copy_file, copy_recursive, copy_to_dir, CopyOptions, EntryInfo, Filter};
pub use error::{ArchiveError, CopyError, FilterError};
pub use pack::copy_tree;
