//! Container formats.
//!
//! - **COMBINE archive** ([`CombineArchive`]) - ZIP + `manifest.xml` + OMEX RDF metadata
//! - **Research Object bundle** ([`RoBundle`]) - ZIP + `.ro/manifest.json`
//!
//! ```text
//! ┌──────────────────┐                         ┌──────────────────┐
//! │ CombineArchive   │  entries, descriptions  │ RoBundle         │
//! │  manifest.xml    │ ◄─────────────────────► │  manifest.json   │
//! │  metadata.rdf    │   (crate::convert)      │  annotations     │
//! └──────────────────┘                         └──────────────────┘
//! ```
//!
//! Both types open read-only from disk with lazy content access and are
//! written exactly once through [`persist_atomically`].

pub mod bundle;
pub mod combine;
pub mod format;
pub mod omex;

pub use bundle::{Manifest, PathAnnotation, PathMetadata, RoBundle};
pub use combine::{ArchiveEntry, CombineArchive};
pub use format::{ExtensionGuesser, FormatGuesser};
pub use omex::{Description, DescriptionBody, OmexDescription};

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

use crate::error::CaroError;

/// Write a file next to `target` and move it into place.
///
/// The temp file is removed on every failure path, and an existing
/// `target` is never overwritten.
pub(crate) fn persist_atomically<F>(target: &Path, suffix: &str, write: F) -> Result<(), CaroError>
where
    F: FnOnce(&mut File) -> Result<(), CaroError>,
{
    if target.exists() {
        return Err(CaroError::Conflict(target.display().to_string()));
    }
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".caro-")
        .suffix(suffix)
        .tempfile_in(parent)?;
    write(temp.as_file_mut())?;
    temp.as_file_mut().sync_all()?;

    temp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            CaroError::Conflict(target.display().to_string())
        } else {
            CaroError::Io(e.error)
        }
    })?;
    tracing::debug!(target = %target.display(), "persisted container");
    Ok(())
}
