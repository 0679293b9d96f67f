//! Research Object bundle → COMBINE archive.

use caro::container::bundle::{PathAnnotation, PathMetadata, RoBundle};
use caro::container::combine::CombineArchive;
use caro::container::format::identifiers;
use caro::convert::escape::EscapedAnnotation;
use caro::person::{Agent, VCard};
use caro::vocab::{paths, uri};
use caro::{ConversionState, Converter, Severity};

use crate::helpers::container_fixtures::*;
use crate::helpers::conversion_helpers::*;

#[test]
fn test_members_become_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = RoBundle::new();
    aggregate_file(&mut bundle, "/model.xml", b"<sbml/>").conforms_to = Some(identifiers::SBML.to_string());
    aggregate_file(&mut bundle, "/data/values.csv", b"1,2\n");
    bundle.annotate(PathAnnotation::new("/model.xml", uri::BF_MAIN_ENTRY).with_generated_id());
    let source = write_bundle(dir.path(), "study.bundle", &mut bundle);
    let target = dir.path().join("study.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(ok, "{:?}", converter.notifications());
    assert_eq!(converter.state(), ConversionState::Written);

    let mut archive = CombineArchive::open(&target).unwrap();
    assert!(archive.errors().is_empty(), "{:?}", archive.errors());
    assert_eq!(archive.entry("/model.xml").unwrap().format, identifiers::SBML);
    assert!(archive.entry("/model.xml").unwrap().master);
    assert_eq!(
        archive.entry("/data/values.csv").unwrap().format,
        "http://purl.org/NET/mediatypes/text/csv"
    );
    assert_eq!(archive.read_content("/data/values.csv").unwrap(), b"1,2\n");

    let note = archive
        .descriptions()
        .iter()
        .filter_map(|d| d.as_omex())
        .find_map(|o| o.description.clone())
        .expect("top-level conversion note");
    assert!(note.contains("Research Object"));
}

#[test]
fn test_unmapped_annotation_is_escaped() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = RoBundle::new();
    aggregate_file(&mut bundle, "/data.csv", b"a,b\n");
    bundle.annotate(
        PathAnnotation::new("/data.csv", "foo")
            .with_relation("http://example.org/custom-unmapped-marker")
            .with_generated_id(),
    );
    let source = write_bundle(dir.path(), "custom.bundle", &mut bundle);
    let target = dir.path().join("custom.omex");

    let (ok, _) = reverse(&source, &target);
    assert!(ok);

    let mut archive = CombineArchive::open(&target).unwrap();
    let escaped: Vec<String> = archive
        .entries()
        .filter(|e| e.format == uri::RO_CONV_ANNOTATION)
        .map(|e| e.path.clone())
        .collect();
    assert_eq!(escaped.len(), 1);
    assert!(escaped[0].starts_with(paths::ANNOTATIONS_DIR));

    let stored = EscapedAnnotation::from_json(&archive.read_content(&escaped[0]).unwrap()).unwrap();
    assert_eq!(stored.about, "/data.csv");
    assert_eq!(stored.content, "foo");
    assert_eq!(
        stored.relation.as_deref(),
        Some("http://example.org/custom-unmapped-marker")
    );
}

#[test]
fn test_duplicate_author_is_not_repeated() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_bundle(dir.path(), "authors.bundle", &mut two_author_bundle());
    let target = dir.path().join("authors.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(ok, "{:?}", converter.notifications());

    let archive = CombineArchive::open(&target).unwrap();
    let model = archive.entry("/model.xml").unwrap();
    assert_eq!(model.descriptions.len(), 2);
    assert_eq!(model.descriptions[0].creators(), &[VCard::new("Jane", "Doe")]);

    let added = model.descriptions[1].as_omex().unwrap();
    assert_eq!(added.creators, vec![VCard::new("John", "Roe")]);
    assert_eq!(
        added.description.as_deref(),
        Some("converted from Research Object manifest")
    );
    assert!(added.created.is_some());

    // the OMEX annotation and its tag found a native home
    assert!(!archive.entries().any(|e| e.format == uri::RO_CONV_ANNOTATION));
}

#[test]
fn test_remote_member_is_skipped_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = RoBundle::new();
    aggregate_file(&mut bundle, "/local.txt", b"local");
    bundle.aggregate(PathMetadata::remote("http://example.org/remote.xml"));
    let source = write_bundle(dir.path(), "remote.bundle", &mut bundle);
    let target = dir.path().join("remote.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(ok);
    let warnings = messages(converter.notifications(), Severity::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("http://example.org/remote.xml"));

    let archive = CombineArchive::open(&target).unwrap();
    assert_eq!(archive.len(), 1);
}

#[test]
fn test_hand_written_uri_members_are_local() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hand-written.bundle");
    let manifest = r#"{
        "aggregates": [
            { "uri": "/data.csv", "mediatype": "text/csv" },
            { "uri": "../other.txt" },
            { "uri": "http://example.org/remote.xml" }
        ]
    }"#;
    write_raw_zip(
        &source,
        &[
            ("mimetype", b"application/vnd.wf4ever.robundle+zip"),
            (".ro/manifest.json", manifest.as_bytes()),
            ("data.csv", b"1,2\n"),
            ("other.txt", b"other"),
        ],
    );
    let target = dir.path().join("hand-written.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(ok);
    let warnings = messages(converter.notifications(), Severity::Warn);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("http://example.org/remote.xml"));

    let archive = CombineArchive::open(&target).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.contains("/data.csv"));
    assert!(archive.contains("/other.txt"));
}

#[test]
fn test_directory_member_is_skipped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = RoBundle::new();
    bundle.add_file("/results/run1.csv", b"1".to_vec());
    bundle.aggregate(PathMetadata::file("/results/"));
    aggregate_file(&mut bundle, "/results/run2.csv", b"2");
    let source = write_bundle(dir.path(), "dirs.bundle", &mut bundle);
    let target = dir.path().join("dirs.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(ok);
    assert!(!converter.has_warnings());

    let archive = CombineArchive::open(&target).unwrap();
    assert!(archive.contains("/results/run2.csv"));
    assert!(!archive.contains("/results/run1.csv"));
    assert!(!archive.contains("/results/"));
}

#[test]
fn test_reserved_member_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = RoBundle::new();
    aggregate_file(&mut bundle, "/manifest.xml", b"<omexManifest/>");
    aggregate_file(&mut bundle, "/model.xml", b"<sbml/>");
    let source = write_bundle(dir.path(), "reserved.bundle", &mut bundle);
    let target = dir.path().join("reserved.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(ok);
    assert!(messages(converter.notifications(), Severity::Warn)
        .iter()
        .any(|m| m.contains("/manifest.xml")));

    let archive = CombineArchive::open(&target).unwrap();
    assert_eq!(archive.len(), 1);
    assert!(archive.contains("/model.xml"));
}

#[test]
fn test_agents_without_omex_metadata_become_one_description() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = RoBundle::new();
    let metadata = aggregate_file(&mut bundle, "/model.xml", b"<sbml/>");
    metadata.created_by = Some(Agent::named("Ada Lovelace").with_uri("mailto:ada@example.org"));
    metadata.authored_by = vec![Agent::named("Charles Babbage")];
    let source = write_bundle(dir.path(), "agents.bundle", &mut bundle);
    let target = dir.path().join("agents.omex");

    let (ok, _) = reverse(&source, &target);
    assert!(ok);

    let archive = CombineArchive::open(&target).unwrap();
    let model = archive.entry("/model.xml").unwrap();
    assert_eq!(model.descriptions.len(), 1);
    let creators = model.descriptions[0].creators();
    assert_eq!(creators.len(), 2);
    assert_eq!(creators[0].email.as_deref(), Some("ada@example.org"));
    assert_eq!(creators[1].family_name.as_deref(), Some("Babbage"));
}

#[test]
fn test_not_a_bundle_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("plain.zip");
    write_raw_zip(&source, &[("readme.txt", b"hello")]);
    let target = dir.path().join("out.omex");

    let (ok, converter) = reverse(&source, &target);
    assert!(!ok);
    assert_eq!(converter.state(), ConversionState::Failed);
    assert!(converter.has_errors());
    assert!(!target.exists());
}
