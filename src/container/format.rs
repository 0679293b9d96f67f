//! Format identifiers and guessing.
//!
//! Entries carry their format as a URI. COMBINE-specific formats use
//! `identifiers.org` URIs, everything else uses the purl mediatype form
//! `http://purl.org/NET/mediatypes/<mime>`.

/// Format URIs defined by the COMBINE specifications.
pub mod identifiers {
    pub const OMEX: &str = "http://identifiers.org/combine.specifications/omex";
    pub const OMEX_MANIFEST: &str = "http://identifiers.org/combine.specifications/omex-manifest";
    pub const OMEX_METADATA: &str = "http://identifiers.org/combine.specifications/omex-metadata";
    pub const SBML: &str = "http://identifiers.org/combine.specifications/sbml";
    pub const SEDML: &str = "http://identifiers.org/combine.specifications/sed-ml";
    pub const CELLML: &str = "http://identifiers.org/combine.specifications/cellml";
    pub const SBGN: &str = "http://identifiers.org/combine.specifications/sbgn";
}

/// Prefix of purl mediatype URIs.
pub const MEDIATYPE_BASE: &str = "http://purl.org/NET/mediatypes/";

/// Fallback format for unrecognised content.
pub const OCTET_STREAM: &str = "http://purl.org/NET/mediatypes/application/octet-stream";

/// Guesses the format URI of a file.
pub trait FormatGuesser: Send + Sync {
    /// Guess from the entry path and its content.
    fn guess(&self, path: &str, content: &[u8]) -> String;
}

/// Extension-based guesser with a light content sniff for XML.
///
/// COMBINE formats are recognised by their own extensions, everything else
/// goes through the `mime_guess` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionGuesser;

impl FormatGuesser for ExtensionGuesser {
    fn guess(&self, path: &str, content: &[u8]) -> String {
        let name = crate::vocab::file_name(path);
        let ext = name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();

        let combine = match ext.as_str() {
            "sbml" => Some(identifiers::SBML),
            "sedml" | "sed-ml" => Some(identifiers::SEDML),
            "cellml" => Some(identifiers::CELLML),
            "sbgn" => Some(identifiers::SBGN),
            "omex" => Some(identifiers::OMEX),
            _ => None,
        };
        if let Some(format) = combine {
            return format.to_string();
        }

        if let Some(mime) = mime_guess::from_path(name).first() {
            return mediatype_to_format(mime.essence_str());
        }

        if looks_like_xml(content) {
            mediatype_to_format("application/xml")
        } else {
            OCTET_STREAM.to_string()
        }
    }
}

fn looks_like_xml(content: &[u8]) -> bool {
    let head = &content[..content.len().min(64)];
    let text = String::from_utf8_lossy(head);
    text.trim_start_matches('\u{feff}').trim_start().starts_with("<?xml")
}

/// `text/csv` → `http://purl.org/NET/mediatypes/text/csv`.
pub fn mediatype_to_format(mediatype: &str) -> String {
    format!("{MEDIATYPE_BASE}{}", mediatype.trim())
}

/// Inverse of [`mediatype_to_format`]; `None` for non-mediatype URIs.
pub fn format_to_mediatype(format: &str) -> Option<&str> {
    format
        .strip_prefix(MEDIATYPE_BASE)
        .filter(|m| m.contains('/'))
}
