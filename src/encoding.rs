//! Byte-encoding detection for package text files.
//!
//! SCORM packages in the wild arrive in a mix of UTF-8 and legacy cyrillic
//! encodings, frequently with no declaration at all. Detection is heuristic:
//! a BOM check first, then a fixed priority list of candidates decoded
//! against a short sample of the file. The first clean decode wins.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{
    Encoding, IBM866, ISO_8859_15, ISO_8859_5, KOI8_R, KOI8_U, UTF_8, WINDOWS_1251, WINDOWS_1252,
    X_MAC_CYRILLIC,
};
use tracing::{debug, info};

/// Candidate encodings, in priority order. Names are kept as reported to the
/// caller; several aliases resolve to the same underlying decoder.
pub const CANDIDATE_ENCODINGS: &[&str] = &[
    "utf-8",
    "utf-8-sig",
    "cp1251",
    "windows-1251",
    "koi8-r",
    "koi8-u",
    "iso-8859-1",
    "iso-8859-5",
    "iso-8859-15",
    "cp866",
    "ibm866",
    "maccyrillic",
    "latin-1",
];

const SAMPLE_LEN: usize = 4096;
const PROBE_LEN: usize = 1000;
const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

/// Resolves one of the candidate names to an `encoding_rs` decoder.
///
/// Several candidate names have no WHATWG label (`utf-8-sig`, `maccyrillic`),
/// so they are mapped explicitly; the rest go through `Encoding::for_label`.
pub fn encoding_for_name(name: &str) -> &'static Encoding {
    match name {
        "utf-8-sig" => UTF_8,
        "cp1251" => WINDOWS_1251,
        "maccyrillic" => X_MAC_CYRILLIC,
        "cp866" => IBM866,
        "iso-8859-1" | "latin-1" => WINDOWS_1252,
        "iso-8859-5" => ISO_8859_5,
        "iso-8859-15" => ISO_8859_15,
        "koi8-r" => KOI8_R,
        "koi8-u" => KOI8_U,
        other => Encoding::for_label(other.as_bytes()).unwrap_or(UTF_8),
    }
}

fn contains_cyrillic(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_alphabetic() && ('\u{0410}'..='\u{044f}').contains(&c))
}

/// Guesses the encoding of a text file from its first bytes.
///
/// Returns the encoding name plus the reason it was chosen: `"BOM detected"`,
/// `"Cyrillic detected"`, `"Success"` or `"Fallback"`.
pub fn detect_encoding(path: &Path) -> std::io::Result<(&'static str, &'static str)> {
    let mut file = File::open(path)?;
    let mut sample = vec![0u8; SAMPLE_LEN];
    let read = file.read(&mut sample)?;
    sample.truncate(read);

    if sample.starts_with(UTF8_BOM) {
        return Ok(("utf-8-sig", "BOM detected"));
    }

    let probe = &sample[..sample.len().min(PROBE_LEN)];
    for name in CANDIDATE_ENCODINGS {
        let encoding = encoding_for_name(name);
        let (decoded, _, had_errors) = encoding.decode(probe);
        if had_errors {
            debug!(path = %path.display(), encoding = name, "Candidate encoding rejected");
            continue;
        }
        if contains_cyrillic(&decoded) {
            return Ok((name, "Cyrillic detected"));
        }
        return Ok((name, "Success"));
    }

    Ok(("utf-8", "Fallback"))
}

/// Reads a whole text file using the detected encoding.
///
/// Decoding runs under the replacement policy, so undecodable byte sequences
/// become U+FFFD rather than errors; a leading BOM character is stripped.
/// Only I/O failures propagate.
pub fn read_text_file(path: &Path) -> std::io::Result<String> {
    let (name, reason) = detect_encoding(path)?;
    info!(path = %path.display(), encoding = name, reason = reason, "Reading text file");

    let bytes = std::fs::read(path)?;
    let encoding = encoding_for_name(name);
    let (decoded, _, _) = encoding.decode(&bytes);
    let mut content = decoded.into_owned();

    if let Some(stripped) = content.strip_prefix('\u{feff}') {
        content = stripped.to_string();
    }

    Ok(content)
}
