//! Research Object bundle → COMBINE archive.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::escape::EscapedAnnotation;
use super::{Converter, Lifecycle};
use crate::config::ConvertOptions;
use crate::container::bundle::{PathAnnotation, PathMetadata, RoBundle};
use crate::container::combine::CombineArchive;
use crate::container::format::{FormatGuesser, mediatype_to_format};
use crate::container::omex::{self, Description, OmexDescription};
use crate::error::CaroError;
use crate::notification::Notifications;
use crate::person::{VCard, person_to_card, same_card};
use crate::vocab::{Vocabulary, is_under, paths, reserved_prefix};

/// Free-text note of descriptions synthesized from manifest agents.
pub const AGENT_NOTE: &str = "converted from Research Object manifest";

/// Converts a Research Object bundle into a COMBINE archive.
#[derive(Debug)]
pub struct RoToCa {
    source: PathBuf,
    options: ConvertOptions,
    lifecycle: Lifecycle,
    bundle: Option<RoBundle>,
    archive: Option<CombineArchive>,
}

impl RoToCa {
    pub fn new(source: impl Into<PathBuf>, options: ConvertOptions) -> Self {
        Self {
            source: source.into(),
            options,
            lifecycle: Lifecycle::default(),
            bundle: None,
            archive: None,
        }
    }

    /// The converted archive, available after the transform phase.
    pub fn combine_archive(&self) -> Option<&CombineArchive> {
        self.archive.as_ref()
    }
}

impl Converter for RoToCa {
    fn source(&self) -> &Path {
        &self.source
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn open_source(&mut self) -> Result<(), CaroError> {
        self.bundle = Some(RoBundle::open(&self.source)?);
        Ok(())
    }

    fn transform(&mut self) -> Result<(), CaroError> {
        let bundle = self
            .bundle
            .as_mut()
            .ok_or_else(|| CaroError::Unsupported("source bundle is not open".to_string()))?;

        let mut ctx = ReverseContext::new(
            &self.options.vocabulary,
            self.options.guesser.as_ref(),
            &mut self.lifecycle.notifications,
            bundle,
        );
        ctx.convert_aggregates(bundle);
        ctx.convert_history(bundle);
        ctx.convert_root_annotations(bundle);
        ctx.sweep_unhandled(bundle);

        let mut archive = ctx.archive;
        archive.add_description(Description::omex(
            "/",
            OmexDescription::new().with_created(Utc::now()).with_description(format!(
                "converted from a Research Object bundle by {} ({})",
                self.options.tool_name, self.options.vocabulary.ro_ca_conv
            )),
        ))?;

        tracing::debug!(entries = archive.len(), "built combine archive");
        self.archive = Some(archive);
        Ok(())
    }

    fn close_source(&mut self) -> Result<(), CaroError> {
        if let Some(bundle) = self.bundle.as_mut() {
            bundle.close();
        }
        Ok(())
    }

    fn write(&mut self, target: &Path) -> Result<(), CaroError> {
        self.archive
            .as_mut()
            .ok_or_else(|| CaroError::Unsupported("no combine archive to write".to_string()))?
            .write_to(target)
    }
}

// ============================================================================
// BUILD CONTEXT
// ============================================================================

/// Accumulated state of one reverse transform.
struct ReverseContext<'a> {
    vocab: &'a Vocabulary,
    guesser: &'a dyn FormatGuesser,
    notes: &'a mut Notifications,
    archive: CombineArchive,
    /// Snapshot of the source manifest's annotations.
    annotations: Vec<PathAnnotation>,
    /// Indexes into `annotations` that found a native counterpart.
    handled: HashSet<usize>,
}

impl<'a> ReverseContext<'a> {
    fn new(
        vocab: &'a Vocabulary,
        guesser: &'a dyn FormatGuesser,
        notes: &'a mut Notifications,
        bundle: &RoBundle,
    ) -> Self {
        Self {
            vocab,
            guesser,
            notes,
            archive: CombineArchive::new(),
            annotations: bundle.manifest().annotations.clone(),
            handled: HashSet::new(),
        }
    }

    // ── Aggregates ──────────────────────────────────────────────────

    fn convert_aggregates(&mut self, bundle: &mut RoBundle) {
        let aggregates = bundle.manifest().aggregates.clone();
        for metadata in &aggregates {
            self.convert_aggregate(bundle, metadata);
        }
    }

    fn convert_aggregate(&mut self, bundle: &mut RoBundle, metadata: &PathMetadata) {
        let Some(path) = metadata.file.as_deref() else {
            if metadata.uri.is_some() {
                self.notes.warn(format!(
                    "skipping manifest entry {} as it seems to be no local file",
                    metadata.display_name()
                ));
            }
            return;
        };

        if bundle.is_directory(path) {
            tracing::trace!(path, "skipping directory");
            return;
        }

        if let Some(prefix) = reserved_prefix(path, paths::CA_RESTRICTIONS) {
            self.notes.warn(format!(
                "dropping {path}: {prefix} is reserved and will be generated for the combine archive"
            ));
            return;
        }

        let content = match bundle.read_file(path) {
            Ok(content) => content,
            Err(e) => {
                self.notes
                    .error(format!("cannot read {path} from research object: {e}"));
                return;
            }
        };

        let format = metadata
            .conforms_to
            .clone()
            .or_else(|| metadata.mediatype.as_deref().map(mediatype_to_format))
            .unwrap_or_else(|| self.guesser.guess(path, &content));
        self.archive.add_entry(path, content, format);

        self.attach_annotations(bundle, path);
        self.promote_agents(metadata, path);
        tracing::trace!(path, "added entry");
    }

    /// Map annotations about `path` that have a native counterpart.
    fn attach_annotations(&mut self, bundle: &mut RoBundle, path: &str) {
        for index in 0..self.annotations.len() {
            if self.annotations[index].about != path || self.handled.contains(&index) {
                continue;
            }
            let annotation = &self.annotations[index];
            let main_entry = self.vocab.is_main_entry(&annotation.content)
                || annotation
                    .relation
                    .as_deref()
                    .is_some_and(|r| self.vocab.is_main_entry(r));

            if main_entry {
                self.archive.set_master(path);
                self.handled.insert(index);
            } else if let Some(tag) = self.omex_tag(index) {
                if self.attach_omex_file(bundle, index, path) {
                    self.handled.insert(index);
                    self.handled.insert(tag);
                }
            }
        }
    }

    /// Index of the annotation tagging annotation `index` as OMEX metadata.
    fn omex_tag(&self, index: usize) -> Option<usize> {
        let id = self.annotations[index].uri.as_deref()?;
        self.annotations
            .iter()
            .position(|a| a.about == id && a.is_tagged(&self.vocab.omex_meta))
    }

    /// Parse the OMEX file behind annotation `index` and attach it to `path`.
    fn attach_omex_file(&mut self, bundle: &mut RoBundle, index: usize, path: &str) -> bool {
        let reference = self.annotations[index].content.clone();
        let file = bundle.resolve(&reference);
        let descriptions = bundle
            .read_file(&file)
            .and_then(|bytes| omex::parse_rdf_document(&bytes));

        match descriptions {
            Ok(descriptions) => {
                for description in descriptions {
                    if let Err(e) = self.archive.add_description(description.rebased(path)) {
                        self.notes.error(format!(
                            "cannot attach meta data from {reference} to {path}: {e}"
                        ));
                    }
                }
                true
            }
            Err(e) => {
                self.notes.error(format!(
                    "reading meta data file {reference} in research object failed: {e}"
                ));
                false
            }
        }
    }

    /// Carry `createdBy`/`authoredBy` over as one OMEX description.
    fn promote_agents(&mut self, metadata: &PathMetadata, path: &str) {
        let Some(entry) = self.archive.entry(path) else {
            return;
        };
        let existing: Vec<VCard> = entry
            .descriptions
            .iter()
            .flat_map(|d| d.creators().iter().cloned())
            .collect();

        let mut queued: Vec<VCard> = Vec::new();
        for agent in metadata.created_by.iter().chain(metadata.authored_by.iter()) {
            let Some(card) = person_to_card(agent) else {
                continue;
            };
            let known = existing
                .iter()
                .chain(queued.iter())
                .any(|other| same_card(other, &card));
            if !known {
                queued.push(card);
            }
        }
        if queued.is_empty() {
            return;
        }

        let description = OmexDescription {
            creators: queued,
            created: Some(metadata.created_on.unwrap_or_else(Utc::now)),
            modified: Vec::new(),
            description: Some(AGENT_NOTE.to_string()),
        };
        if let Err(e) = self.archive.add_description(Description::omex(path, description)) {
            self.notes
                .warn(format!("cannot attach authors of {path}: {e}"));
        }
    }

    // ── History ─────────────────────────────────────────────────────

    fn convert_history(&mut self, bundle: &mut RoBundle) {
        let history = bundle.manifest().history.clone();
        for path in &history {
            if let Some(prefix) = reserved_prefix(path, paths::CA_RESTRICTIONS) {
                self.notes.warn(format!(
                    "dropping history {path}: {prefix} is reserved in combine archives"
                ));
                continue;
            }
            let content = match bundle.read_file(path) {
                Ok(content) => content,
                Err(e) => {
                    self.notes
                        .warn(format!("cannot read history {path} from research object: {e}"));
                    continue;
                }
            };
            let format = if path == paths::EVOLUTION {
                self.vocab.turtle_mime.clone()
            } else {
                self.guesser.guess(path, &content)
            };
            self.archive.add_entry(path, content, format);
        }
    }

    // ── Root ────────────────────────────────────────────────────────

    /// Conversion markers and OMEX metadata about the bundle itself.
    fn convert_root_annotations(&mut self, bundle: &mut RoBundle) {
        for index in 0..self.annotations.len() {
            if self.annotations[index].about != "/" || self.handled.contains(&index) {
                continue;
            }
            if self.vocab.is_conversion_marker(&self.annotations[index].content) {
                self.handled.insert(index);
            } else if let Some(tag) = self.omex_tag(index) {
                if self.attach_omex_file(bundle, index, "/") {
                    self.handled.insert(index);
                    self.handled.insert(tag);
                }
            }
        }
    }

    // ── Fallback ────────────────────────────────────────────────────

    /// Store every unhandled annotation as an escape-hatch file.
    fn sweep_unhandled(&mut self, bundle: &mut RoBundle) {
        for index in 0..self.annotations.len() {
            if self.handled.contains(&index) {
                continue;
            }
            let escaped = EscapedAnnotation::from(&self.annotations[index]);
            let file = escaped.file_path(|p| self.archive.contains(p) || bundle.contains_file(p));
            match escaped.to_json() {
                Ok(json) => {
                    self.archive
                        .add_entry(&file, json, self.vocab.ro_conv_annotation.clone());
                    tracing::trace!(file = %file, about = %escaped.about, "escaped annotation");
                }
                Err(e) => {
                    self.notes
                        .warn(format!("cannot keep annotation about {}: {e}", escaped.about));
                    continue;
                }
            }

            let body = bundle.resolve(&escaped.content);
            if is_under(&body, paths::ANNOTATIONS_DIR)
                && bundle.contains_file(&body)
                && !self.archive.contains(&body)
            {
                match bundle.read_file(&body) {
                    Ok(content) => {
                        self.archive
                            .add_entry(&body, content, self.vocab.ro_copy_annotation.clone());
                    }
                    Err(e) => self
                        .notes
                        .warn(format!("cannot copy annotation body {body}: {e}")),
                }
            }
        }
    }
}
