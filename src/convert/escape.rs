//! Escape-hatch files for annotations without a COMBINE counterpart.
//!
//! A bundle annotation that cannot be expressed as OMEX metadata is stored
//! in the archive as a small JSON file under `/.ro/annotations/`:
//!
//! ```json
//! { "about": "/data.csv", "content": "foo", "id": "urn:uuid:…", "relation": "http://…" }
//! ```
//!
//! The forward converter turns such files back into the original annotation.

use serde::{Deserialize, Serialize};

use crate::container::bundle::PathAnnotation;
use crate::error::CaroError;
use crate::vocab::{file_name, paths};

/// Extension of escape-hatch files.
pub const EXTENSION: &str = ".json";

/// A serialized annotation triple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapedAnnotation {
    pub about: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl From<&PathAnnotation> for EscapedAnnotation {
    fn from(annotation: &PathAnnotation) -> Self {
        Self {
            about: annotation.about.clone(),
            content: annotation.content.clone(),
            id: annotation.uri.clone(),
            relation: annotation.relation.clone(),
        }
    }
}

impl From<EscapedAnnotation> for PathAnnotation {
    fn from(escaped: EscapedAnnotation) -> Self {
        PathAnnotation {
            uri: escaped.id,
            about: escaped.about,
            relation: escaped.relation,
            content: escaped.content,
        }
    }
}

impl EscapedAnnotation {
    pub fn to_json(&self) -> Result<Vec<u8>, CaroError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(input: &[u8]) -> Result<Self, CaroError> {
        serde_json::from_slice(input)
            .map_err(|e| CaroError::json(format!("Invalid escaped annotation: {e}")))
    }

    /// Collision-free location for this annotation's file.
    ///
    /// Tries `<about-name>-annotation.json`, then appends `a` .. `z`, `za` ..
    pub fn file_path(&self, taken: impl Fn(&str) -> bool) -> String {
        let base = format!("{}/{}-annotation", paths::ANNOTATIONS_DIR, subject_name(&self.about));
        let mut suffix = String::new();
        loop {
            let candidate = format!("{base}{suffix}{EXTENSION}");
            if !taken(&candidate) {
                return candidate;
            }
            next_suffix(&mut suffix);
        }
    }
}

/// File-name-safe name of an annotation subject.
fn subject_name(about: &str) -> String {
    let name: String = file_name(about)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() { "root".to_string() } else { name }
}

fn next_suffix(suffix: &mut String) {
    match suffix.pop() {
        None => suffix.push('a'),
        Some('z') => suffix.push_str("za"),
        Some(c) => suffix.push((c as u8 + 1) as char),
    }
}
