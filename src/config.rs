//! Conversion options shared by both converters.

use std::fmt;
use std::sync::Arc;

use crate::container::format::{ExtensionGuesser, FormatGuesser};
use crate::vocab::Vocabulary;

/// Tool name recorded in synthesized metadata.
pub const DEFAULT_TOOL_NAME: &str = concat!("CaRo ", env!("CARGO_PKG_VERSION"));

/// Options for one conversion run.
///
/// Cloning is cheap: the vocabulary and guesser are shared.
#[derive(Clone)]
pub struct ConvertOptions {
    pub vocabulary: Arc<Vocabulary>,
    pub guesser: Arc<dyn FormatGuesser>,
    pub tool_name: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            vocabulary: Arc::new(Vocabulary::default()),
            guesser: Arc::new(ExtensionGuesser),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
        }
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("vocabulary", &self.vocabulary)
            .field("tool_name", &self.tool_name)
            .finish_non_exhaustive()
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vocabulary(mut self, vocabulary: Arc<Vocabulary>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_guesser(mut self, guesser: Arc<dyn FormatGuesser>) -> Self {
        self.guesser = guesser;
        self
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }
}
