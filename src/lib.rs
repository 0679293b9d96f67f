//! # caro
//!
//! Bidirectional conversion between COMBINE archives and Research Object
//! bundles.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! convert      → Orchestrator, CaToRo, RoToCa, escape-hatch files
//!   ↓
//! config       → ConvertOptions (vocabulary, format guesser, tool name)
//!   ↓
//! container    → CombineArchive, RoBundle, OMEX descriptions, format guessing
//!   ↓
//! person       → Agent ⇄ VCard mapping, dedup predicate
//!   ↓
//! xml          → Minimal namespace-aware XML tree (quick-xml)
//!   ↓
//! vocab, notification, error
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use caro::{CaToRo, ConvertOptions, Converter};
//!
//! let mut converter = CaToRo::new("model.omex", ConvertOptions::default());
//! let ok = converter.convert_to(Path::new("model.bundle"));
//! for notification in converter.notifications() {
//!     println!("{notification}");
//! }
//! assert!(ok || converter.has_errors());
//! ```

// ============================================================================
// MODULES (dependency order: error → vocab → xml → person → container → convert)
// ============================================================================

/// Error type shared by the container and XML layers
pub mod error;

/// Severity-tagged notification log
pub mod notification;

/// Marker vocabulary, reserved paths, path helpers
pub mod vocab;

/// Minimal XML tree with namespace resolution
pub mod xml;

/// Person records of both formats
pub mod person;

/// COMBINE archive and Research Object bundle containers
pub mod container;

/// Conversion options
pub mod config;

/// Conversion lifecycle and the two directional converters
pub mod convert;

pub use config::ConvertOptions;
pub use convert::{CaToRo, ConversionState, Converter, RoToCa};
pub use error::CaroError;
pub use notification::{Notification, Notifications, Severity};
pub use vocab::Vocabulary;
