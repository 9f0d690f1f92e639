mod common;

use std::fs;

use common::{ScriptedDetector, query, write_sprite};
use sprite_anchor::pipeline::{collect_images, detect_all, register};
use sprite_anchor::{AnchorAdapter, AnchorRecord, AnchorStore, NamingRule, load_merged};
use tempfile::tempdir;

fn adapter(blind_widths: Vec<u32>) -> AnchorAdapter {
    AnchorAdapter::new(Box::new(ScriptedDetector { blind_widths }), query())
}

#[test]
fn one_missed_detection_leaves_the_rest_of_the_batch() {
    let dir = tempdir().expect("tempdir");
    let images = dir.path().join("portraits");
    fs::create_dir_all(&images).unwrap();
    for (i, name) in ["Alice", "Bob", "Carol", "Dave", "Eve"].iter().enumerate() {
        write_sprite(&images, &format!("{name}_00.png"), 100 + i as u32 * 10, 200);
    }

    let store = AnchorStore::new(dir.path().join("seg-result.json"));
    let summary = register(
        &mut adapter(vec![120]),
        &NamingRule::default(),
        &images,
        &["png".to_string()],
        &store,
    )
    .expect("batch should not fail");

    assert_eq!(summary.scanned, 5);
    assert_eq!(summary.registered, 4);
    assert_eq!(summary.no_detection, 1);

    let saved = store.load_all().unwrap();
    assert_eq!(saved.len(), 4);
    assert!(!saved.contains_key("Carol"));
    assert_eq!(saved["Alice"], AnchorRecord::new(100, 200, 0.5, 0.4).unwrap());
}

#[test]
fn rerun_overwrites_instead_of_accumulating() {
    let dir = tempdir().expect("tempdir");
    let images = dir.path().join("portraits");
    fs::create_dir_all(&images).unwrap();
    write_sprite(&images, "Alice_00.png", 100, 100);
    write_sprite(&images, "Bob_00.png", 150, 100);

    let store = AnchorStore::new(dir.path().join("seg-result.json"));
    let naming = NamingRule::default();
    let exts = ["png".to_string()];

    register(&mut adapter(vec![]), &naming, &images, &exts, &store).unwrap();
    assert_eq!(store.load_all().unwrap().len(), 2);

    let first_run = store.load_all().unwrap();
    register(&mut adapter(vec![]), &naming, &images, &exts, &store).unwrap();
    assert_eq!(store.load_all().unwrap(), first_run);

    register(&mut adapter(vec![150]), &naming, &images, &exts, &store).unwrap();
    let third = store.load_all().unwrap();
    assert_eq!(third.len(), 1);
    assert!(third.contains_key("Alice"));
}

#[test]
fn manual_override_restores_missed_subject() {
    let dir = tempdir().expect("tempdir");
    let images = dir.path().join("portraits");
    fs::create_dir_all(&images).unwrap();
    write_sprite(&images, "Alice_00.png", 100, 100);
    write_sprite(&images, "Bob_00.png", 150, 100);

    let store = AnchorStore::new(dir.path().join("seg-result.json"));
    let manual = AnchorStore::new(dir.path().join("seg-result-manual.json"));
    fs::write(manual.path(), r#"{"Bob": [150, 100, 0.25, 0.75]}"#).unwrap();

    register(
        &mut adapter(vec![150]),
        &NamingRule::default(),
        &images,
        &["png".to_string()],
        &store,
    )
    .unwrap();

    let merged = load_merged(&store, &manual).unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged["Bob"], AnchorRecord::new(150, 100, 0.25, 0.75).unwrap());
    assert!(!store.load_all().unwrap().contains_key("Bob"));
}

#[test]
fn undecodable_files_are_skipped() {
    let dir = tempdir().expect("tempdir");
    write_sprite(dir.path(), "Alice_00.png", 100, 100);
    fs::write(dir.path().join("Broken_00.png"), b"not a png").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let images = collect_images(dir.path(), &["png".to_string()]).unwrap();
    assert_eq!(images.len(), 2);

    let (anchors, summary) = detect_all(&mut adapter(vec![]), &NamingRule::default(), &images);
    assert_eq!(anchors.len(), 1);
    assert_eq!(summary.failed, 1);
}

#[test]
fn captures_of_one_subject_collapse_to_one_key() {
    let dir = tempdir().expect("tempdir");
    write_sprite(dir.path(), "Alice_00.png", 100, 100);
    write_sprite(dir.path(), "Alice_01.png", 200, 100);

    let images = collect_images(dir.path(), &["png".to_string()]).unwrap();
    let (anchors, summary) = detect_all(&mut adapter(vec![]), &NamingRule::default(), &images);
    assert_eq!(anchors.len(), 1);
    assert_eq!(summary.registered, 1);
    // Sorted input, so the later capture is the one kept.
    assert_eq!(anchors["Alice"].width(), 200);
}

#[test]
fn missing_image_directory_is_an_error() {
    let dir = tempdir().expect("tempdir");
    assert!(collect_images(&dir.path().join("absent"), &["png".to_string()]).is_err());
}
