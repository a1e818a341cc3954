use std::fs;

use tempfile::tempdir;

use scorm_import::encoding::{detect_encoding, read_text_file};

#[test]
fn test_utf8_bom_short_circuits_detection() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("bom.html");
    let mut bytes = vec![0xef, 0xbb, 0xbf];
    bytes.extend_from_slice("<p>hello</p>".as_bytes());
    fs::write(&path, bytes).unwrap();

    let (encoding, reason) = detect_encoding(&path).unwrap();
    assert_eq!(encoding, "utf-8-sig");
    assert_eq!(reason, "BOM detected");

    // The BOM character never reaches the decoded content.
    let content = read_text_file(&path).unwrap();
    assert_eq!(content, "<p>hello</p>");
}

#[test]
fn test_plain_ascii_detects_as_utf8() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("ascii.html");
    fs::write(&path, "<p>plain text</p>").unwrap();

    let (encoding, reason) = detect_encoding(&path).unwrap();
    assert_eq!(encoding, "utf-8");
    assert_eq!(reason, "Success");
}

#[test]
fn test_utf8_cyrillic_reports_cyrillic_reason() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("ru.html");
    fs::write(&path, "<p>Привет мир</p>").unwrap();

    let (encoding, reason) = detect_encoding(&path).unwrap();
    assert_eq!(encoding, "utf-8");
    assert_eq!(reason, "Cyrillic detected");
}

#[test]
fn test_cp1251_bytes_fall_through_to_cp1251() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("cp1251.html");
    let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode("<p>Привет мир</p>");
    fs::write(&path, encoded).unwrap();

    let (encoding, reason) = detect_encoding(&path).unwrap();
    assert_eq!(encoding, "cp1251");
    assert_eq!(reason, "Cyrillic detected");

    let content = read_text_file(&path).unwrap();
    assert_eq!(content, "<p>Привет мир</p>");
}

#[test]
fn test_read_text_file_never_fails_on_mixed_garbage() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("garbage.bin");
    // Bytes invalid in UTF-8 but decodable by a legacy candidate; the
    // replacement policy guarantees a string comes back either way.
    fs::write(&path, [0x80u8, 0xfe, 0xff, 0x41, 0x42]).unwrap();

    let content = read_text_file(&path).unwrap();
    assert!(content.contains("AB"));
}
