use std::fs;
use std::io::Write;
use std::time::Duration;

use tempfile::tempdir;

use scorm_import::config::Config;
use scorm_import::contract::MockLessonStore;
use scorm_import::import::{import_package, ImportError};
use scorm_import::store::MemoryStore;

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const MANIFEST_XML: &[u8] = br#"<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"
          xmlns:imsmd="http://www.imsglobal.org/xsd/imsmd_v1p2">
  <metadata>
    <imsmd:lom><imsmd:general>
      <imsmd:title>Sample Course</imsmd:title>
      <imsmd:description>About things</imsmd:description>
    </imsmd:general></imsmd:lom>
  </metadata>
  <organizations>
    <organization identifier="ORG-1"><title>Org</title></organization>
  </organizations>
  <resources>
    <resource identifier="RES-1" type="webcontent" href="a_intro.html">
      <file href="a_intro.html"/>
      <file href="b_details.html"/>
      <file href="img/pic.png"/>
    </resource>
  </resources>
</manifest>
"#;

fn test_config(base: &std::path::Path) -> Config {
    Config {
        upload_dir: base.join("uploads"),
        scorm_dir: base.join("uploads/scorm"),
    }
}

#[tokio::test]
async fn test_import_creates_one_lesson_per_html_file_with_numbered_titles() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::new();
    let archive = build_zip(&[
        ("imsmanifest.xml", MANIFEST_XML),
        (
            "a_intro.html",
            b"<h1>Intro</h1><p>Hello <b>world</b></p><img src=\"img/pic.png\">",
        ),
        ("b_details.html", b"<h1>Details</h1><p>More</p>"),
        ("img/pic.png", b"png-bytes"),
    ]);

    let summary = import_package(&archive, "course.zip", 5, &store, &config)
        .await
        .unwrap();

    assert_eq!(summary.message, "SCORM package processed successfully");
    assert_eq!(summary.summary.total_files_found, 2);
    assert_eq!(summary.summary.lessons_created, 2);
    assert_eq!(summary.summary.failed_conversions, 0);
    assert_eq!(summary.summary.total_images_found, 1);
    assert_eq!(summary.summary.images_processed, 1);
    assert!(summary.failed_conversions.is_none());
    assert!(summary.warning.is_none());

    assert_eq!(summary.metadata.title.as_deref(), Some("Sample Course"));
    assert_eq!(summary.metadata.description.as_deref(), Some("About things"));
    assert_eq!(summary.metadata.organizations, 1);
    assert_eq!(summary.metadata.resources, 1);

    assert_eq!(summary.lessons_created[0].title, "Lesson 1: a_intro");
    assert_eq!(summary.lessons_created[1].title, "Lesson 2: b_details");

    let lessons = store.lessons();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].course_id, 5);
    assert_eq!(lessons[0].order, 0);
    assert!(lessons[0].content.starts_with("# Intro"));
    assert!(lessons[0].content.contains("**world**"));
    assert!(lessons[1].content.starts_with("# Details"));

    let scorm_data = lessons[0].scorm_data.as_ref().unwrap();
    assert_eq!(scorm_data["imported_from_scorm"], true);
    assert_eq!(scorm_data["images_count"], 1);
    assert_eq!(scorm_data["scorm_metadata"]["title"], "Sample Course");
    assert_eq!(scorm_data["scorm_metadata"]["encoding_used"], "utf-8");

    let attachments = store.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].lesson_id, lessons[0].id);
    assert_eq!(attachments[0].mime_type, "image/png");
    assert!(!attachments[0].is_video);
    assert!(attachments[0].file_path.is_file());
    assert_eq!(attachments[0].file_size, "png-bytes".len() as u64);

    // The rewritten markdown points at the managed copy.
    assert!(lessons[0]
        .content
        .contains(&format!("/uploads/courses/5/lessons/{}/images/", lessons[0].id)));
}

#[tokio::test]
async fn test_single_html_file_keeps_its_plain_title() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::new();
    let archive = build_zip(&[
        (
            "imsmanifest.xml",
            br#"<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"><resources/></manifest>"#,
        ),
        ("overview.html", b"<p>only one</p>"),
    ]);

    let summary = import_package(&archive, "course.scorm", 9, &store, &config)
        .await
        .unwrap();

    assert_eq!(summary.lessons_created.len(), 1);
    assert_eq!(summary.lessons_created[0].title, "overview");
}

#[tokio::test]
async fn test_rejected_file_names() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::new();

    let err = import_package(b"irrelevant", "course.rar", 1, &store, &config)
        .await
        .unwrap_err();
    match err {
        ImportError::InvalidArchiveType(ext) => assert_eq!(ext, ".rar"),
        other => panic!("expected InvalidArchiveType, got {other:?}"),
    }

    let err = import_package(b"irrelevant", "", 1, &store, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingFileName), "got: {err:?}");

    assert!(store.lessons().is_empty());
}

#[tokio::test]
async fn test_corrupt_archive_fails_fatally_and_leaves_no_residue() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::new();

    let err = import_package(b"not a zip at all", "broken.zip", 3, &store, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Extract(_)), "got: {err:?}");
    assert!(store.lessons().is_empty());

    // The per-import extraction directory must be gone again.
    let residue: Vec<_> = match fs::read_dir(&config.scorm_dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
        Err(_) => Vec::new(),
    };
    assert!(residue.is_empty(), "residue left: {residue:?}");
}

#[tokio::test]
async fn test_store_failure_degrades_to_per_file_failure_entries() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let mut store = MockLessonStore::new();
    store
        .expect_create_lesson()
        .returning(|_| Err("database unavailable".into()));
    let archive = build_zip(&[
        (
            "imsmanifest.xml",
            br#"<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"><resources/></manifest>"#,
        ),
        ("one.html", b"<p>1</p>"),
        ("two.html", b"<p>2</p>"),
    ]);

    let summary = import_package(&archive, "course.pif", 2, &store, &config)
        .await
        .unwrap();

    assert_eq!(summary.summary.lessons_created, 0);
    assert_eq!(summary.summary.failed_conversions, 2);
    let failures = summary.failed_conversions.as_ref().unwrap();
    assert_eq!(failures.len(), 2);
    assert!(failures[0].error.contains("persistence failed"));
    assert!(failures[0].error.contains("database unavailable"));
    assert_eq!(
        summary.warning.as_deref(),
        Some("Failed to convert 2 file(s)")
    );
}

#[tokio::test]
async fn test_extracted_tree_is_removed_by_the_deferred_cleanup_task() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::new();
    let archive = build_zip(&[
        (
            "imsmanifest.xml",
            br#"<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"><resources/></manifest>"#,
        ),
        ("index.html", b"<p>hi</p>"),
    ]);

    import_package(&archive, "course.zip", 4, &store, &config)
        .await
        .unwrap();

    // Cleanup is handed to a spawned task; give it a moment to run.
    let mut cleaned = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let residue = fs::read_dir(&config.scorm_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        if residue == 0 {
            cleaned = true;
            break;
        }
    }
    assert!(cleaned, "extraction directory was not cleaned up");
}

#[tokio::test]
async fn test_summary_serialization_shape() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let store = MemoryStore::new();
    let archive = build_zip(&[
        (
            "imsmanifest.xml",
            br#"<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"><resources/></manifest>"#,
        ),
        ("index.html", b"<p>hi</p>"),
    ]);

    let summary = import_package(&archive, "course.zip", 1, &store, &config)
        .await
        .unwrap();
    let value = serde_json::to_value(&summary).unwrap();

    assert_eq!(value["message"], "SCORM package processed successfully");
    assert_eq!(value["summary"]["lessons_created"], 1);
    assert!(value["failed_conversions"].is_null());
    assert!(value["metadata"]["title"].is_null());
    // No failures, so the warning key is omitted entirely.
    assert!(value.get("warning").is_none());
}
