//! COMBINE archive (OMEX) support.
//!
//! A COMBINE archive is a ZIP file whose content is listed in a root
//! `manifest.xml`. Descriptive metadata lives in RDF/XML files listed with
//! the OMEX metadata format.
//!
//! ## Archive Structure
//!
//! ```text
//! showcase.omex (ZIP archive)
//! ├── manifest.xml           # omexManifest, one <content> per entry
//! ├── metadata.rdf           # OMEX descriptions (rdf:about="./model.xml")
//! ├── model.xml              # entries, one of them flagged master="true"
//! └── .ro/
//!     └── evolution.ttl      # optional provenance trail
//! ```
//!
//! Opened archives read entry content lazily from the ZIP file; archives
//! built in memory keep their content in memory until written.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use indexmap::IndexMap;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::format::identifiers;
use super::omex::{self, Description};
use super::persist_atomically;
use crate::error::CaroError;
use crate::vocab::{normalize_path, split_fragment, zip_name};
use crate::xml::{self, XmlElement};

/// Standard paths within a COMBINE archive.
pub mod paths {
    /// Manifest file location.
    pub const MANIFEST: &str = "/manifest.xml";
    /// Metadata file written by this crate.
    pub const METADATA: &str = "/metadata.rdf";
}

/// Namespace of the `omexManifest` document.
pub const MANIFEST_NAMESPACE: &str = "http://identifiers.org/combine.specifications/omex-manifest";

/// One file in the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Absolute path, e.g. `/model.xml`.
    pub path: String,
    /// Format URI.
    pub format: String,
    /// Flagged as a main entry.
    pub master: bool,
    pub descriptions: Vec<Description>,
}

impl ArchiveEntry {
    pub fn new(path: impl AsRef<str>, format: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            format: format.into(),
            master: false,
            descriptions: Vec::new(),
        }
    }
}

/// A COMBINE archive, opened from disk or built in memory.
#[derive(Debug, Default)]
pub struct CombineArchive {
    entries: IndexMap<String, ArchiveEntry>,
    /// Descriptions about the archive itself.
    descriptions: Vec<Description>,
    contents: HashMap<String, Vec<u8>>,
    zip: Option<ZipArchive<File>>,
    errors: Vec<String>,
}

impl CombineArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an archive read-only.
    ///
    /// Fails only when the file is not a ZIP or has no readable manifest.
    /// Problems with individual manifest items are collected in
    /// [`errors`](Self::errors).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaroError> {
        let file = File::open(path.as_ref())?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| CaroError::archive(format!("Failed to open archive: {e}")))?;

        let manifest = read_zip_file(&mut zip, paths::MANIFEST)
            .map_err(|_| CaroError::missing_file(zip_name(paths::MANIFEST)))?;
        let manifest = xml::parse(&manifest)?;
        if manifest.local_name() != "omexManifest" {
            return Err(CaroError::xml(format!(
                "Expected omexManifest root, found {}",
                manifest.name
            )));
        }

        let names: HashSet<String> = zip.file_names().map(normalize_path).collect();
        let mut archive = CombineArchive::new();
        let mut metadata_files = Vec::new();

        for content in manifest.elements().filter(|e| e.local_name() == "content") {
            let Some(location) = content.attribute(None, "location") else {
                archive.errors.push("manifest item without location".to_string());
                continue;
            };
            let path = normalize_path(location);
            if path == "/" {
                continue;
            }
            let Some(format) = content.attribute(None, "format") else {
                archive
                    .errors
                    .push(format!("manifest item {path} has no format"));
                continue;
            };
            if !names.contains(&path) {
                archive
                    .errors
                    .push(format!("manifest lists {path} but the archive has no such file"));
                continue;
            }
            if format == identifiers::OMEX_METADATA {
                metadata_files.push(path);
                continue;
            }

            let mut entry = ArchiveEntry::new(&path, format);
            entry.master = content
                .attribute(None, "master")
                .is_some_and(|m| m.eq_ignore_ascii_case("true"));
            archive.entries.insert(path, entry);
        }

        for path in metadata_files {
            let parsed = read_zip_file(&mut zip, &path)
                .and_then(|bytes| omex::parse_rdf_document(&bytes));
            match parsed {
                Ok(descriptions) => {
                    for mut description in descriptions {
                        description.about = normalize_reference(&description.about);
                        archive.attach(description, &path);
                    }
                }
                Err(e) => archive
                    .errors
                    .push(format!("cannot read meta data file {path}: {e}")),
            }
        }

        tracing::debug!(
            entries = archive.entries.len(),
            errors = archive.errors.len(),
            "opened combine archive"
        );
        archive.zip = Some(zip);
        Ok(archive)
    }

    fn attach(&mut self, description: Description, source: &str) {
        let target = description.path().to_string();
        if target == "/" {
            self.descriptions.push(description);
        } else if let Some(entry) = self.entries.get_mut(&target) {
            entry.descriptions.push(description);
        } else {
            self.errors.push(format!(
                "meta data in {source} describes unknown entry {target}"
            ));
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Entries in manifest order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    pub fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn main_entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values().filter(|e| e.master)
    }

    /// Descriptions about the archive itself.
    pub fn descriptions(&self) -> &[Description] {
        &self.descriptions
    }

    /// Problems found while opening.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Read an entry's content.
    pub fn read_content(&mut self, path: &str) -> Result<Vec<u8>, CaroError> {
        let path = normalize_path(path);
        if let Some(bytes) = self.contents.get(&path) {
            return Ok(bytes.clone());
        }
        if !self.entries.contains_key(&path) {
            return Err(CaroError::missing_file(path));
        }
        match self.zip.as_mut() {
            Some(zip) => read_zip_file(zip, &path),
            None => Err(CaroError::Unsupported(format!(
                "archive is closed, cannot read {path}"
            ))),
        }
    }

    // ── Building ────────────────────────────────────────────────────

    /// Add (or replace) an entry.
    pub fn add_entry(
        &mut self,
        path: &str,
        content: Vec<u8>,
        format: impl Into<String>,
    ) -> &mut ArchiveEntry {
        let entry = ArchiveEntry::new(path, format);
        let key = entry.path.clone();
        self.contents.insert(key.clone(), content);
        self.entries.insert(key.clone(), entry);
        &mut self.entries[&key]
    }

    /// Flag an entry as main entry. Returns false for unknown paths.
    pub fn set_master(&mut self, path: &str) -> bool {
        match self.entries.get_mut(&normalize_path(path)) {
            Some(entry) => {
                entry.master = true;
                true
            }
            None => false,
        }
    }

    /// Attach a description to the entry named by its `about` (or to the archive for `/`).
    pub fn add_description(&mut self, description: Description) -> Result<(), CaroError> {
        let target = description.path().to_string();
        if target == "/" {
            self.descriptions.push(description);
            return Ok(());
        }
        match self.entries.get_mut(&target) {
            Some(entry) => {
                entry.descriptions.push(description);
                Ok(())
            }
            None => Err(CaroError::invalid_entry(format!(
                "cannot describe unknown entry {target}"
            ))),
        }
    }

    /// Release the underlying file handle.
    pub fn close(&mut self) {
        self.zip = None;
    }

    // ── Writing ─────────────────────────────────────────────────────

    /// Write to `target` via a temp file; never overwrites an existing file.
    pub fn write_to(&mut self, target: impl AsRef<Path>) -> Result<(), CaroError> {
        persist_atomically(target.as_ref(), ".omex", |file| self.write_zip(file))
    }

    /// Serialize the archive into memory.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, CaroError> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_zip(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    fn write_zip<W: Write + Seek>(&mut self, writer: W) -> Result<(), CaroError> {
        let mut zip = ZipWriter::new(writer);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let has_metadata = !self.descriptions.is_empty()
            || self.entries.values().any(|e| !e.descriptions.is_empty());

        zip.start_file(zip_name(paths::MANIFEST), options)?;
        zip.write_all(self.manifest_document(has_metadata)?.as_bytes())?;

        if has_metadata {
            zip.start_file(zip_name(paths::METADATA), options)?;
            zip.write_all(self.metadata_document()?.as_bytes())?;
        }

        let paths: Vec<String> = self.entries.keys().cloned().collect();
        for path in paths {
            let content = self.read_content(&path)?;
            zip.start_file(zip_name(&path), options)?;
            zip.write_all(&content)?;
        }

        zip.finish()
            .map_err(|e| CaroError::archive(format!("Failed to finalize archive: {e}")))?;
        Ok(())
    }

    fn manifest_document(&self, has_metadata: bool) -> Result<String, CaroError> {
        let content = |location: &str, format: &str| {
            XmlElement::new("content", Some(MANIFEST_NAMESPACE))
                .with_attribute("location", None, location)
                .with_attribute("format", None, format)
        };

        let mut root = XmlElement::new("omexManifest", Some(MANIFEST_NAMESPACE))
            .with_namespace_decl("", MANIFEST_NAMESPACE)
            .with_child(content(".", identifiers::OMEX));
        if has_metadata {
            root.push_child(content(
                &archive_reference(paths::METADATA),
                identifiers::OMEX_METADATA,
            ));
        }
        for entry in self.entries.values() {
            let mut item = content(&archive_reference(&entry.path), &entry.format);
            if entry.master {
                item.set_attribute("master", None, "true");
            }
            root.push_child(item);
        }
        xml::to_pretty_string(&root)
    }

    fn metadata_document(&self) -> Result<String, CaroError> {
        let elements = self
            .descriptions
            .iter()
            .chain(self.entries.values().flat_map(|e| e.descriptions.iter()))
            .map(|d| d.to_element(&archive_reference(&d.about)))
            .collect();
        omex::write_rdf_document(elements)
    }
}

/// `./model.xml#x` → `/model.xml#x`, `.` → `/`.
fn normalize_reference(reference: &str) -> String {
    let (path, fragment) = split_fragment(reference);
    let path = normalize_path(path);
    match fragment {
        Some(f) => format!("{path}#{f}"),
        None => path,
    }
}

/// `/model.xml#x` → `./model.xml#x`, `/` → `.`.
fn archive_reference(reference: &str) -> String {
    let (path, fragment) = split_fragment(reference);
    let base = if path == "/" {
        ".".to_string()
    } else {
        format!(".{path}")
    };
    match fragment {
        Some(f) => format!("{base}#{f}"),
        None => base,
    }
}

fn read_zip_file<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>, CaroError> {
    let mut file = zip
        .by_name(zip_name(path))
        .map_err(|e| CaroError::archive(format!("Failed to read {path}: {e}")))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| CaroError::archive(format!("Failed to read {path}: {e}")))?;
    Ok(content)
}
