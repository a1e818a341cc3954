use std::fs;
use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

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

#[test]
fn test_import_subcommand_prints_json_summary() {
    let tmp = tempdir().unwrap();
    let archive_path = tmp.path().join("course.zip");
    fs::write(
        &archive_path,
        build_zip(&[
            (
                "imsmanifest.xml",
                br#"<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1"><resources/></manifest>"#,
            ),
            ("index.html", b"<h1>Hello</h1>"),
        ]),
    )
    .unwrap();
    let config_path = tmp.path().join("config.yml");
    fs::write(
        &config_path,
        format!("upload_dir: {}\n", tmp.path().join("uploads").display()),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("scorm-import").unwrap();
    cmd.arg("import")
        .arg("--archive")
        .arg(&archive_path)
        .arg("--course-id")
        .arg("1")
        .arg("--config")
        .arg(&config_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Import complete."))
        .stdout(predicate::str::contains("\"lessons_created\": 1"))
        .stdout(predicate::str::contains(
            "SCORM package processed successfully",
        ));
}

#[test]
fn test_import_rejects_unsupported_archive_extension() {
    let tmp = tempdir().unwrap();
    let archive_path = tmp.path().join("course.rar");
    fs::write(&archive_path, b"not an archive").unwrap();
    let config_path = tmp.path().join("config.yml");
    fs::write(
        &config_path,
        format!("upload_dir: {}\n", tmp.path().join("uploads").display()),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("scorm-import").unwrap();
    cmd.arg("import")
        .arg("--archive")
        .arg(&archive_path)
        .arg("--course-id")
        .arg("1")
        .arg("--config")
        .arg(&config_path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("[ERROR] Import failed"));
}

#[test]
fn test_missing_subcommand_shows_usage() {
    let mut cmd = Command::cargo_bin("scorm-import").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
