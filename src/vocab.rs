//! Marker vocabulary and well-known container paths.
//!
//! Markers are relation URIs used as tags, never as content. They are
//! collected in an immutable [`Vocabulary`] that is built once and shared
//! with every converter through an `Arc`.

use serde::{Deserialize, Serialize};

/// Standard marker URIs.
pub mod uri {
    /// Base of the CaRo annotation vocabulary.
    pub const CARO_ANNOTATIONS: &str = "http://sems.uni-rostock.de/CaRo/annotations#";
    pub const MAIN_ENTRY: &str = "http://sems.uni-rostock.de/CaRo/annotations#mainEntry";
    pub const BF_MAIN_ENTRY: &str = "http://binfalse.de/ro#mainEntry";
    pub const OMEX_META: &str = "http://sems.uni-rostock.de/CaRo/annotations#omexMeta";
    pub const CA_RO_CONV: &str = "http://sems.uni-rostock.de/CaRo/annotations#ca2ro";
    pub const RO_CA_CONV: &str = "http://sems.uni-rostock.de/CaRo/annotations#ro2ca";
    pub const RO_CONV_ANNOTATION: &str =
        "http://sems.uni-rostock.de/CaRo/annotations#roConvAnnotation";
    pub const RO_COPY_ANNOTATION: &str =
        "http://sems.uni-rostock.de/CaRo/annotations#roCopyAnnotation";
    /// Media type URI of a turtle-serialized evolution file.
    pub const TURTLE_MIME: &str = "http://purl.org/NET/mediatypes/text/turtle";
}

/// Standard paths shared by both container formats.
pub mod paths {
    /// Location of the provenance/evolution file.
    pub const EVOLUTION: &str = "/.ro/evolution.ttl";
    /// Directory holding annotation bodies and escape-hatch files.
    pub const ANNOTATIONS_DIR: &str = "/.ro/annotations";
    /// Files reserved by the Research Object bundle format.
    pub const RO_RESTRICTIONS: &[&str] = &[
        "/.ro/manifest.json",
        "/META-INF/container.xml",
        "/META-INF/manifest.xml",
        "/mimetype",
    ];
    /// Files reserved by the COMBINE archive format.
    pub const CA_RESTRICTIONS: &[&str] = &["/metadata.rdf", "/manifest.xml"];
}

/// Immutable table of marker URIs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub main_entry: String,
    pub bf_main_entry: String,
    pub omex_meta: String,
    pub ca_ro_conv: String,
    pub ro_ca_conv: String,
    pub ro_conv_annotation: String,
    pub ro_copy_annotation: String,
    pub turtle_mime: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            main_entry: uri::MAIN_ENTRY.to_string(),
            bf_main_entry: uri::BF_MAIN_ENTRY.to_string(),
            omex_meta: uri::OMEX_META.to_string(),
            ca_ro_conv: uri::CA_RO_CONV.to_string(),
            ro_ca_conv: uri::RO_CA_CONV.to_string(),
            ro_conv_annotation: uri::RO_CONV_ANNOTATION.to_string(),
            ro_copy_annotation: uri::RO_COPY_ANNOTATION.to_string(),
            turtle_mime: uri::TURTLE_MIME.to_string(),
        }
    }
}

impl Vocabulary {
    /// Either spelling of the main-entry marker.
    pub fn is_main_entry(&self, marker: &str) -> bool {
        marker == self.main_entry || marker == self.bf_main_entry
    }

    /// A root marker recording that a container was machine-converted.
    pub fn is_conversion_marker(&self, marker: &str) -> bool {
        marker == self.ca_ro_conv || marker == self.ro_ca_conv
    }

    /// Format identifiers used for escape-hatch entries in a COMBINE archive.
    pub fn is_escape_hatch(&self, format: &str) -> bool {
        format == self.ro_conv_annotation || format == self.ro_copy_annotation
    }
}

// ============================================================================
// PATH HELPERS
// ============================================================================

/// Normalise an entry path to the absolute `/a/b` form.
///
/// Accepts `./a/b`, `a/b` and `/a/b`. The container itself (`.`, `./`, empty)
/// becomes `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let stripped = trimmed
        .strip_prefix("./")
        .or_else(|| trimmed.strip_prefix('/'))
        .unwrap_or(if trimmed == "." { "" } else { trimmed });
    let mut out = String::with_capacity(stripped.len() + 1);
    for segment in stripped.split('/').filter(|s| !s.is_empty() && *s != ".") {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    } else if stripped.ends_with('/') {
        out.push('/');
    }
    out
}

/// Component-wise prefix test: `/a/b` is under `/a` but `/ab` is not.
pub fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// First reserved prefix that `path` falls under.
pub fn reserved_prefix<'a>(path: &str, restrictions: &[&'a str]) -> Option<&'a str> {
    restrictions.iter().copied().find(|r| is_under(path, r))
}

/// Name of an entry inside the ZIP file (no leading slash).
pub fn zip_name(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Last path segment.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Split `path#fragment` into its parts.
pub fn split_fragment(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (reference, None),
    }
}
