//! Research Object bundle support.
//!
//! A Research Object bundle is a ZIP file with a JSON manifest that lists
//! aggregated resources and annotations about them.
//!
//! ## Bundle Structure
//!
//! ```text
//! study.bundle (ZIP archive)
//! ├── mimetype               # application/vnd.wf4ever.robundle+zip, stored
//! ├── .ro/
//! │   ├── manifest.json      # aggregates, annotations, history
//! │   ├── evolution.ttl      # optional history
//! │   └── annotations/       # annotation bodies
//! └── data.csv               # aggregated resources
//! ```
//!
//! ## Manifest
//!
//! ```json
//! {
//!   "@context": ["https://w3id.org/bundle/context"],
//!   "id": "/",
//!   "aggregates": [
//!     { "uri": "/data.csv", "mediatype": "text/csv" },
//!     { "uri": "http://example.org/remote" }
//!   ],
//!   "annotations": [
//!     { "uri": "urn:uuid:…", "about": "/data.csv", "content": "annotations/a.rdf" }
//!   ]
//! }
//! ```
//!
//! Relative paths in the manifest resolve against `/.ro/`. Paths of
//! aggregates, history items and annotation subjects are resolved on open;
//! annotation content is kept as written because it may be a literal.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::persist_atomically;
use crate::error::CaroError;
use crate::person::Agent;
use crate::vocab::{normalize_path, zip_name};

/// Standard paths within a bundle.
pub mod paths {
    pub const MIMETYPE: &str = "/mimetype";
    pub const MANIFEST: &str = "/.ro/manifest.json";
    /// Base directory for relative manifest references.
    pub const RO_DIR: &str = "/.ro/";
}

/// Content of the `mimetype` file.
pub const MIMETYPE: &str = "application/vnd.wf4ever.robundle+zip";

/// JSON-LD context of bundle manifests.
pub const CONTEXT: &str = "https://w3id.org/bundle/context";

// ============================================================================
// MANIFEST
// ============================================================================

/// The `.ro/manifest.json` document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(rename = "@context", default, deserialize_with = "one_or_many")]
    pub context: Vec<String>,

    #[serde(default = "root_id")]
    pub id: String,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub manifest: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Agent>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub authored_by: Vec<Agent>,

    /// Provenance trail (paths of evolution files).
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,

    #[serde(default)]
    pub aggregates: Vec<PathMetadata>,

    #[serde(default)]
    pub annotations: Vec<PathAnnotation>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            context: vec![CONTEXT.to_string()],
            id: root_id(),
            manifest: vec![paths::MANIFEST.to_string()],
            created_on: None,
            created_by: None,
            authored_by: Vec::new(),
            history: Vec::new(),
            aggregates: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

fn root_id() -> String {
    "/".to_string()
}

/// An aggregated resource: a local `file` or a remote `uri`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediatype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conforms_to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Agent>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub authored_by: Vec<Agent>,
}

impl PathMetadata {
    pub fn file(path: &str) -> Self {
        Self {
            file: Some(normalize_path(path)),
            ..Self::default()
        }
    }

    pub fn remote(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Identifier used in diagnostics.
    pub fn display_name(&self) -> &str {
        self.file
            .as_deref()
            .or(self.uri.as_deref())
            .or(self.folder.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// An annotation: `content` says something about `about`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAnnotation {
    /// Annotation identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default = "root_id")]
    pub about: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    #[serde(default)]
    pub content: String,
}

impl PathAnnotation {
    pub fn new(about: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            uri: None,
            about: about.into(),
            relation: None,
            content: content.into(),
        }
    }

    /// Assign a fresh `urn:uuid:` identifier.
    pub fn with_generated_id(mut self) -> Self {
        self.uri = Some(format!("urn:uuid:{}", uuid::Uuid::new_v4()));
        self
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Tagged with `marker`, either as content or as relation.
    pub fn is_tagged(&self, marker: &str) -> bool {
        self.content == marker || self.relation.as_deref() == Some(marker)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
        None => Vec::new(),
    })
}

// ============================================================================
// BUNDLE
// ============================================================================

/// A Research Object bundle, opened from disk or built in memory.
#[derive(Debug)]
pub struct RoBundle {
    manifest: Manifest,
    contents: BTreeMap<String, Vec<u8>>,
    zip: Option<ZipArchive<File>>,
    /// Normalised names of all files in the opened ZIP.
    zip_names: HashSet<String>,
}

impl Default for RoBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl RoBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self {
            manifest: Manifest {
                created_on: Some(Utc::now()),
                ..Manifest::default()
            },
            contents: BTreeMap::new(),
            zip: None,
            zip_names: HashSet::new(),
        }
    }

    /// Open a bundle read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaroError> {
        let file = File::open(path.as_ref())?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| CaroError::archive(format!("Failed to open bundle: {e}")))?;

        let raw = read_zip_file(&mut zip, paths::MANIFEST)
            .map_err(|_| CaroError::missing_file(zip_name(paths::MANIFEST)))?;
        let mut manifest: Manifest = serde_json::from_slice(&raw)
            .map_err(|e| CaroError::json(format!("Invalid bundle manifest: {e}")))?;

        for pmd in &mut manifest.aggregates {
            pmd.file = pmd.file.as_deref().map(resolve_reference);
            pmd.folder = pmd.folder.as_deref().map(resolve_reference);
            // a `uri` without a scheme names a member of the bundle
            if pmd.file.is_none() && pmd.uri.as_deref().is_some_and(|u| !has_scheme(u)) {
                pmd.file = pmd.uri.take().as_deref().map(resolve_reference);
            }
        }
        for annotation in &mut manifest.annotations {
            annotation.about = resolve_reference(&annotation.about);
        }
        manifest.history = manifest.history.iter().map(|h| resolve_reference(h)).collect();

        let zip_names = zip.file_names().map(normalize_path).collect();
        tracing::debug!(
            aggregates = manifest.aggregates.len(),
            annotations = manifest.annotations.len(),
            "opened research object bundle"
        );

        Ok(Self {
            manifest,
            contents: BTreeMap::new(),
            zip: Some(zip),
            zip_names,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Resolve a manifest reference to a bundle path (URIs are returned unchanged).
    pub fn resolve(&self, reference: &str) -> String {
        resolve_reference(reference)
    }

    /// Is there a regular file at `path`?
    pub fn contains_file(&self, path: &str) -> bool {
        let path = normalize_path(path);
        !path.ends_with('/') && (self.contents.contains_key(&path) || self.zip_names.contains(&path))
    }

    /// Is `path` a directory of the bundle?
    pub fn is_directory(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if path.ends_with('/') {
            return true;
        }
        let prefix = format!("{path}/");
        self.zip_names
            .iter()
            .chain(self.contents.keys())
            .any(|name| name.starts_with(&prefix))
    }

    /// Read a file's content.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>, CaroError> {
        let path = normalize_path(path);
        if let Some(bytes) = self.contents.get(&path) {
            return Ok(bytes.clone());
        }
        match self.zip.as_mut() {
            Some(zip) if self.zip_names.contains(&path) => read_zip_file(zip, &path),
            Some(_) => Err(CaroError::missing_file(path)),
            None => Err(CaroError::Unsupported(format!(
                "bundle is closed or has no file {path}"
            ))),
        }
    }

    /// Store a file in the bundle without aggregating it.
    pub fn add_file(&mut self, path: &str, content: Vec<u8>) {
        self.contents.insert(normalize_path(path), content);
    }

    /// Aggregate a resource, replacing any previous metadata for the same file.
    pub fn aggregate(&mut self, metadata: PathMetadata) -> &mut PathMetadata {
        let existing = metadata.file.as_ref().and_then(|file| {
            self.manifest
                .aggregates
                .iter()
                .position(|a| a.file.as_ref() == Some(file))
        });
        let index = match existing {
            Some(i) => {
                self.manifest.aggregates[i] = metadata;
                i
            }
            None => {
                self.manifest.aggregates.push(metadata);
                self.manifest.aggregates.len() - 1
            }
        };
        &mut self.manifest.aggregates[index]
    }

    pub fn aggregation(&self, path: &str) -> Option<&PathMetadata> {
        let path = normalize_path(path);
        self.manifest
            .aggregates
            .iter()
            .find(|a| a.file.as_deref() == Some(path.as_str()))
    }

    pub fn annotate(&mut self, annotation: PathAnnotation) {
        self.manifest.annotations.push(annotation);
    }

    /// Annotations whose subject is `about`.
    pub fn annotations_about<'a>(&'a self, about: &'a str) -> impl Iterator<Item = &'a PathAnnotation> {
        self.manifest.annotations.iter().filter(move |a| a.about == about)
    }

    /// Release the underlying file handle.
    pub fn close(&mut self) {
        self.zip = None;
    }

    /// Write to `target` via a temp file; never overwrites an existing file.
    pub fn write_to(&mut self, target: impl AsRef<Path>) -> Result<(), CaroError> {
        persist_atomically(target.as_ref(), ".bundle", |file| self.write_zip(file))
    }

    /// Serialize the bundle into memory.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, CaroError> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_zip(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    fn write_zip<W: Write + Seek>(&mut self, writer: W) -> Result<(), CaroError> {
        let mut zip = ZipWriter::new(writer);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(zip_name(paths::MIMETYPE), stored)?;
        zip.write_all(MIMETYPE.as_bytes())?;

        let mut manifest = self.manifest.clone();
        for pmd in &mut manifest.aggregates {
            if pmd.uri.is_none() {
                pmd.uri = pmd.file.take();
            }
        }
        let manifest = serde_json::to_vec_pretty(&manifest)?;
        zip.start_file(zip_name(paths::MANIFEST), deflated)?;
        zip.write_all(&manifest)?;

        let mut names: Vec<String> = self
            .contents
            .keys()
            .chain(self.zip_names.iter())
            .filter(|n| !n.ends_with('/') && *n != paths::MIMETYPE && *n != paths::MANIFEST)
            .cloned()
            .collect();
        names.sort();
        names.dedup();

        for name in names {
            let content = self.read_file(&name)?;
            zip.start_file(zip_name(&name), deflated)?;
            zip.write_all(&content)?;
        }

        zip.finish()
            .map_err(|e| CaroError::archive(format!("Failed to finalize bundle: {e}")))?;
        Ok(())
    }
}

/// Resolve a manifest reference against `/.ro/`.
///
/// URIs with a scheme are returned unchanged, absolute paths are normalised.
pub fn resolve_reference(reference: &str) -> String {
    let reference = reference.trim();
    if has_scheme(reference) {
        return reference.to_string();
    }
    if reference.starts_with('/') {
        return normalize_path(reference);
    }

    let mut segments: Vec<&str> = paths::RO_DIR.split('/').filter(|s| !s.is_empty()).collect();
    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut resolved = format!("/{}", segments.join("/"));
    if reference.ends_with('/') && resolved != "/" {
        resolved.push('/');
    }
    resolved
}

fn has_scheme(reference: &str) -> bool {
    url::Url::parse(reference).is_ok()
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
