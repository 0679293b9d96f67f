//! COMBINE archive → Research Object bundle.

use caro::container::bundle::RoBundle;
use caro::container::combine::CombineArchive;
use caro::vocab::{paths, uri};
use caro::{ConversionState, Converter, Severity};
use rstest::rstest;

use crate::helpers::container_fixtures::*;
use crate::helpers::conversion_helpers::*;

#[test]
fn test_showcase_archive_becomes_annotated_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_archive(dir.path(), "showcase.omex", &mut showcase_archive());
    let target = dir.path().join("showcase.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(ok, "{:?}", converter.notifications());
    assert_eq!(converter.state(), ConversionState::Written);
    assert!(!converter.has_errors());

    let mut bundle = RoBundle::open(&target).unwrap();
    let model = bundle.aggregation("/model.xml").expect("model aggregated");
    assert_eq!(model.conforms_to.as_deref(), Some(sbml_format().as_str()));
    assert_eq!(model.mediatype.as_deref(), Some("application/sbml+xml"));
    assert!(bundle.aggregation("/data.csv").is_some());

    let about_model: Vec<_> = bundle.annotations_about("/model.xml").cloned().collect();
    assert!(about_model.iter().any(|a| a.content == uri::MAIN_ENTRY));

    let omex_annotation = about_model
        .iter()
        .find(|a| {
            let id = a.uri.as_deref().unwrap_or_default();
            bundle.annotations_about(id).any(|t| t.content == uri::OMEX_META)
        })
        .expect("an OMEX-tagged annotation about the model");
    let file = bundle.resolve(&omex_annotation.content);
    assert!(file.starts_with(paths::ANNOTATIONS_DIR));
    let rdf = String::from_utf8(bundle.read_file(&file).unwrap()).unwrap();
    assert!(rdf.contains("Jane"));
    assert!(rdf.contains("Doe"));

    assert!(bundle
        .annotations_about("/")
        .any(|a| a.content == uri::CA_RO_CONV));
}

#[test]
fn test_self_listed_manifest_is_dropped_with_one_warning() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("self-listing.omex");
    self_listing_archive(&source);
    let target = dir.path().join("out.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(ok);

    let warnings: Vec<String> = messages(converter.notifications(), Severity::Warn)
        .into_iter()
        .filter(|m| m.contains("manifest.xml"))
        .collect();
    assert_eq!(warnings.len(), 1, "{warnings:?}");

    let bundle = RoBundle::open(&target).unwrap();
    assert!(!bundle.contains_file("/manifest.xml"));
    assert!(bundle.aggregation("/manifest.xml").is_none());
    assert!(bundle.aggregation("/model.xml").is_some());
}

#[rstest]
#[case("/mimetype")]
#[case("/.ro/manifest.json")]
#[case("/META-INF/manifest.xml")]
#[case("/META-INF/container.xml")]
#[case("/metadata.rdf")]
fn test_reserved_entries_never_reach_the_bundle(#[case] reserved: &str) {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = CombineArchive::new();
    archive.add_entry(reserved, b"reserved".to_vec(), "http://purl.org/NET/mediatypes/text/plain");
    archive.add_entry("/keep.txt", b"keep".to_vec(), "http://purl.org/NET/mediatypes/text/plain");
    let source = write_archive(dir.path(), "reserved.omex", &mut archive);
    let target = dir.path().join("out.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(ok);
    assert!(converter.has_warnings());
    assert!(messages(converter.notifications(), Severity::Warn)
        .iter()
        .any(|m| m.contains(reserved)));

    let bundle = RoBundle::open(&target).unwrap();
    assert!(bundle.aggregation(reserved).is_none());
    assert!(bundle.aggregation("/keep.txt").is_some());
}

#[test]
fn test_evolution_file_becomes_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = CombineArchive::new();
    archive.add_entry(paths::EVOLUTION, b"@prefix prov: <http://www.w3.org/ns/prov#> .".to_vec(), uri::TURTLE_MIME);
    let source = write_archive(dir.path(), "evolution.omex", &mut archive);
    let target = dir.path().join("out.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(ok);
    assert!(!converter.has_warnings());
    let notes = messages(converter.notifications(), Severity::Note);
    assert!(notes.iter().any(|m| m.contains("history")), "{notes:?}");

    let mut bundle = RoBundle::open(&target).unwrap();
    assert_eq!(bundle.manifest().history, vec![paths::EVOLUTION.to_string()]);
    assert!(bundle.aggregation(paths::EVOLUTION).is_none());
    assert!(bundle.read_file(paths::EVOLUTION).is_ok());
}

#[test]
fn test_evolution_with_wrong_format_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = CombineArchive::new();
    archive.add_entry(paths::EVOLUTION, b"not turtle".to_vec(), "http://purl.org/NET/mediatypes/text/plain");
    let source = write_archive(dir.path(), "evolution.omex", &mut archive);
    let target = dir.path().join("out.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(ok);
    assert_eq!(messages(converter.notifications(), Severity::Warn).len(), 1);

    let bundle = RoBundle::open(&target).unwrap();
    assert!(bundle.manifest().history.is_empty());
    assert!(!bundle.contains_file(paths::EVOLUTION));
}

#[test]
fn test_missing_entry_is_reported_while_reading() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("missing.omex");
    let manifest = omex_manifest(&[
        (".", caro::container::format::identifiers::OMEX, false),
        ("./ghost.xml", caro::container::format::identifiers::SBML, false),
        ("./model.xml", caro::container::format::identifiers::SBML, true),
    ]);
    write_raw_zip(&source, &[("manifest.xml", manifest.as_bytes()), ("model.xml", b"<sbml/>")]);
    let target = dir.path().join("out.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(ok);
    assert!(messages(converter.notifications(), Severity::Warn)
        .iter()
        .any(|m| m.starts_with("reading archive: ") && m.contains("ghost.xml")));
}

#[test]
fn test_unreadable_source_fails_without_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.omex");
    std::fs::write(&source, b"this is not a zip file").unwrap();
    let target = dir.path().join("out.bundle");

    let (ok, converter) = forward(&source, &target);
    assert!(!ok);
    assert!(converter.has_errors());
    assert_eq!(converter.state(), ConversionState::Failed);
    assert!(messages(converter.notifications(), Severity::Error)[0].contains("open"));
    assert!(!target.exists());
}

#[test]
fn test_existing_target_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_archive(dir.path(), "showcase.omex", &mut showcase_archive());
    let target = dir.path().join("taken.bundle");
    std::fs::write(&target, b"keep me").unwrap();

    let (ok, converter) = forward(&source, &target);
    assert!(!ok);
    assert!(converter.has_errors());
    assert!(messages(converter.notifications(), Severity::Error)[0].contains("write"));
    assert_eq!(std::fs::read(&target).unwrap(), b"keep me");
    assert!(converter.research_object().is_some());
}
