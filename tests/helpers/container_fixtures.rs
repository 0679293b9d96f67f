//! Container fixtures written into a temp directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use caro::container::bundle::{PathAnnotation, PathMetadata, RoBundle};
use caro::container::combine::CombineArchive;
use caro::container::format::{identifiers, mediatype_to_format};
use caro::container::omex::{self, Description, OmexDescription};
use caro::person::{Agent, VCard};
use caro::vocab::uri;
use zip::write::SimpleFileOptions;

/// Format of the showcase model.
pub fn sbml_format() -> String {
    mediatype_to_format("application/sbml+xml")
}

/// `/model.xml` (main entry, described by Jane Doe) and `/data.csv`.
pub fn showcase_archive() -> CombineArchive {
    let mut archive = CombineArchive::new();
    archive.add_entry("/model.xml", b"<sbml/>".to_vec(), sbml_format());
    archive.add_entry("/data.csv", b"time,value\n0,1\n".to_vec(), mediatype_to_format("text/csv"));
    archive.set_master("/model.xml");
    archive
        .add_description(Description::omex(
            "/model.xml",
            OmexDescription::new()
                .with_creator(VCard::new("Jane", "Doe"))
                .with_description("A showcase model"),
        ))
        .expect("model.xml is an entry");
    archive
}

/// Persist `archive` as `<dir>/<name>`.
pub fn write_archive(dir: &Path, name: &str, archive: &mut CombineArchive) -> PathBuf {
    let path = dir.join(name);
    archive.write_to(&path).expect("fixture archive should be written");
    path
}

/// Persist `bundle` as `<dir>/<name>`.
pub fn write_bundle(dir: &Path, name: &str, bundle: &mut RoBundle) -> PathBuf {
    let path = dir.join(name);
    bundle.write_to(&path).expect("fixture bundle should be written");
    path
}

/// Write a ZIP file with exactly the given members.
pub fn write_raw_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

/// An `omexManifest` listing `(location, format, master)` items.
pub fn omex_manifest(items: &[(&str, &str, bool)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <omexManifest xmlns=\"http://identifiers.org/combine.specifications/omex-manifest\">\n",
    );
    for (location, format, master) in items {
        let master = if *master { " master=\"true\"" } else { "" };
        xml.push_str(&format!(
            "  <content location=\"{location}\" format=\"{format}\"{master}/>\n"
        ));
    }
    xml.push_str("</omexManifest>\n");
    xml
}

/// An archive that lists its own `manifest.xml` as an entry.
pub fn self_listing_archive(path: &Path) {
    let manifest = omex_manifest(&[
        (".", identifiers::OMEX, false),
        ("./manifest.xml", identifiers::OMEX_MANIFEST, false),
        ("./model.xml", identifiers::SBML, true),
    ]);
    write_raw_zip(
        path,
        &[("manifest.xml", manifest.as_bytes()), ("model.xml", b"<sbml/>")],
    );
}

/// Aggregate `content` at `path`.
pub fn aggregate_file<'a>(bundle: &'a mut RoBundle, path: &str, content: &[u8]) -> &'a mut PathMetadata {
    bundle.add_file(path, content.to_vec());
    bundle.aggregate(PathMetadata::file(path))
}

/// Attach an OMEX-tagged annotation file describing `about` with `creators`.
pub fn annotate_with_omex(bundle: &mut RoBundle, about: &str, file: &str, creators: &[VCard]) {
    let mut description = OmexDescription::new();
    for creator in creators {
        description = description.with_creator(creator.clone());
    }
    let element = Description::omex(about, description).to_element(about);
    let document = omex::write_rdf_document(vec![element]).unwrap();
    bundle.add_file(file, document.into_bytes());

    let annotation = PathAnnotation::new(about, file).with_generated_id();
    let id = annotation.uri.clone().unwrap();
    bundle.annotate(annotation);
    bundle.annotate(PathAnnotation::new(id, uri::OMEX_META).with_generated_id());
}

/// `/model.xml` authored by Jane Doe (also in OMEX metadata) and John Roe.
pub fn two_author_bundle() -> RoBundle {
    let mut bundle = RoBundle::new();
    let metadata = aggregate_file(&mut bundle, "/model.xml", b"<sbml/>");
    metadata.conforms_to = Some(identifiers::SBML.to_string());
    metadata.authored_by = vec![Agent::named("Jane Doe"), Agent::named("John Roe")];
    annotate_with_omex(
        &mut bundle,
        "/model.xml",
        "/.ro/annotations/model-meta.rdf",
        &[VCard::new("Jane", "Doe")],
    );
    bundle
}
