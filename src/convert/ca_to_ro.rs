//! COMBINE archive → Research Object bundle.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::escape::EscapedAnnotation;
use super::{Converter, Lifecycle};
use crate::config::ConvertOptions;
use crate::container::bundle::{PathAnnotation, PathMetadata, RoBundle};
use crate::container::combine::{ArchiveEntry, CombineArchive};
use crate::container::format::format_to_mediatype;
use crate::container::omex::{self, Description};
use crate::error::CaroError;
use crate::notification::Notifications;
use crate::person::{Agent, card_to_person};
use crate::vocab::{Vocabulary, paths, reserved_prefix};

/// Converts a COMBINE archive into a Research Object bundle.
#[derive(Debug)]
pub struct CaToRo {
    source: PathBuf,
    options: ConvertOptions,
    lifecycle: Lifecycle,
    archive: Option<CombineArchive>,
    bundle: Option<RoBundle>,
}

impl CaToRo {
    pub fn new(source: impl Into<PathBuf>, options: ConvertOptions) -> Self {
        Self {
            source: source.into(),
            options,
            lifecycle: Lifecycle::default(),
            archive: None,
            bundle: None,
        }
    }

    /// The converted bundle, available after the transform phase.
    pub fn research_object(&self) -> Option<&RoBundle> {
        self.bundle.as_ref()
    }
}

impl Converter for CaToRo {
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
        let archive = CombineArchive::open(&self.source)?;
        for error in archive.errors() {
            self.lifecycle
                .notifications
                .warn(format!("reading archive: {error}"));
        }
        self.archive = Some(archive);
        Ok(())
    }

    fn transform(&mut self) -> Result<(), CaroError> {
        let archive = self
            .archive
            .as_mut()
            .ok_or_else(|| CaroError::Unsupported("source archive is not open".to_string()))?;

        let mut ctx = ForwardContext::new(
            &self.options.vocabulary,
            &mut self.lifecycle.notifications,
            archive,
        );
        ctx.bundle.manifest_mut().created_by = Some(Agent::named(self.options.tool_name.clone()));

        ctx.convert_archive(archive);

        tracing::debug!(
            aggregates = ctx.bundle.manifest().aggregates.len(),
            annotations = ctx.bundle.manifest().annotations.len(),
            "built research object"
        );
        self.bundle = Some(ctx.bundle);
        Ok(())
    }

    fn close_source(&mut self) -> Result<(), CaroError> {
        if let Some(archive) = self.archive.as_mut() {
            archive.close();
        }
        Ok(())
    }

    fn write(&mut self, target: &Path) -> Result<(), CaroError> {
        self.bundle
            .as_mut()
            .ok_or_else(|| CaroError::Unsupported("no research object to write".to_string()))?
            .write_to(target)
    }
}

// ============================================================================
// BUILD CONTEXT
// ============================================================================

/// Accumulated state of one forward transform.
struct ForwardContext<'a> {
    vocab: &'a Vocabulary,
    notes: &'a mut Notifications,
    bundle: RoBundle,
    /// Paths that generated annotation files must not use.
    taken: HashSet<String>,
    annotation_number: usize,
}

impl<'a> ForwardContext<'a> {
    fn new(vocab: &'a Vocabulary, notes: &'a mut Notifications, archive: &CombineArchive) -> Self {
        let mut bundle = RoBundle::new();
        bundle.annotate(PathAnnotation::new("/", vocab.ca_ro_conv.clone()).with_generated_id());

        Self {
            vocab,
            notes,
            bundle,
            taken: archive.entries().map(|e| e.path.clone()).collect(),
            annotation_number: 0,
        }
    }

    /// Converts every entry, then the archive-level descriptions as annotations about `/`.
    fn convert_archive(&mut self, archive: &mut CombineArchive) {
        let entries: Vec<ArchiveEntry> = archive.entries().cloned().collect();
        for entry in &entries {
            self.convert_entry(archive, entry);
        }

        let root_descriptions = archive.descriptions().to_vec();
        for description in &root_descriptions {
            self.annotate_description("/", description);
        }
    }

    fn convert_entry(&mut self, archive: &mut CombineArchive, entry: &ArchiveEntry) {
        let path = entry.path.as_str();

        // reserved paths are dropped whatever format they claim
        let restricted = reserved_prefix(path, paths::RO_RESTRICTIONS)
            .or_else(|| reserved_prefix(path, paths::CA_RESTRICTIONS));
        if let Some(prefix) = restricted {
            self.notes.warn(format!(
                "dropping {path}: {prefix} is reserved and will be generated for the research object"
            ));
            return;
        }

        if self.vocab.is_escape_hatch(&entry.format) {
            self.restore_escaped(archive, entry);
            return;
        }

        let is_evolution = path == paths::EVOLUTION;
        if is_evolution && entry.format != self.vocab.turtle_mime {
            self.notes.warn(format!(
                "dropping {path} as this is a special file in research objects and its format is {}",
                entry.format
            ));
            return;
        }

        let content = match archive.read_content(path) {
            Ok(content) => content,
            Err(e) => {
                self.notes.error(format!("cannot read {path} from archive: {e}"));
                return;
            }
        };
        self.bundle.add_file(path, content);

        if is_evolution {
            self.notes.note(format!("using {path} as research object history"));
            self.bundle.manifest_mut().history = vec![path.to_string()];
            return;
        }

        let mut metadata = PathMetadata::file(path);
        metadata.conforms_to = Some(entry.format.clone());
        metadata.mediatype = format_to_mediatype(&entry.format).map(str::to_string);
        self.promote_single_creator(entry, &mut metadata);
        self.bundle.aggregate(metadata);

        for description in &entry.descriptions {
            self.annotate_description(path, description);
        }

        if entry.master {
            self.bundle.annotate(
                PathAnnotation::new(path, self.vocab.main_entry.clone()).with_generated_id(),
            );
        }
        tracing::trace!(path, "aggregated entry");
    }

    /// Move an unambiguous single creator into the native author fields.
    fn promote_single_creator(&mut self, entry: &ArchiveEntry, metadata: &mut PathMetadata) {
        let [description] = entry.descriptions.as_slice() else {
            return;
        };
        let Some(omex) = description.as_omex() else {
            return;
        };
        let [creator] = omex.creators.as_slice() else {
            return;
        };
        if creator.organization.is_some() {
            return;
        }
        if let Some(agent) = card_to_person(creator, self.notes) {
            metadata.authored_by = vec![agent];
            metadata.created_on = omex.created;
        }
    }

    /// Serialize a description to an annotation file and link it to `about`.
    fn annotate_description(&mut self, about: &str, description: &Description) {
        let file = self.next_annotation_file();
        let document = omex::write_rdf_document(vec![description.to_element(&description.about)]);
        let document = match document {
            Ok(document) => document,
            Err(e) => {
                self.notes.warn(format!(
                    "skipping conversion of annotation for {}: {e}",
                    description.about
                ));
                return;
            }
        };
        self.bundle.add_file(&file, document.into_bytes());

        let annotation = PathAnnotation::new(about, file).with_generated_id();
        if let Some(id) = annotation.uri.clone() {
            self.bundle
                .annotate(PathAnnotation::new(id, self.vocab.omex_meta.clone()).with_generated_id());
        }
        self.bundle.annotate(annotation);
    }

    fn next_annotation_file(&mut self) -> String {
        loop {
            self.annotation_number += 1;
            let candidate = format!(
                "{}/omex-conversion-{}.rdf",
                paths::ANNOTATIONS_DIR,
                self.annotation_number
            );
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Turn an escape-hatch entry back into what it stood for.
    fn restore_escaped(&mut self, archive: &mut CombineArchive, entry: &ArchiveEntry) {
        let path = entry.path.as_str();
        let content = match archive.read_content(path) {
            Ok(content) => content,
            Err(e) => {
                self.notes.error(format!("cannot read {path} from archive: {e}"));
                return;
            }
        };

        if entry.format == self.vocab.ro_copy_annotation {
            tracing::trace!(path, "restoring copied annotation body");
            self.bundle.add_file(path, content);
            return;
        }

        match EscapedAnnotation::from_json(&content) {
            Ok(escaped) => {
                tracing::trace!(path, about = %escaped.about, "restoring escaped annotation");
                self.bundle.annotate(escaped.into());
            }
            Err(e) => self
                .notes
                .warn(format!("cannot restore annotation from {path}: {e}")),
        }
    }
}
