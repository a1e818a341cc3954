//! Asset rehoming: copy image references out of the extracted tree into
//! managed per-lesson storage and rewrite the references in place.
//!
//! Two reference kinds are handled, in order: inline `<img src=...>` tags,
//! then CSS `background-image: url(...)` declarations. References that
//! cannot be resolved to a real file are left untouched and logged; a miss
//! is never an error.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use tracing::{error, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp"];

/// Which kind of reference an asset was rehomed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    InlineImage,
    BackgroundImage,
}

/// One successfully rehomed asset. Built transiently per conversion and
/// consumed immediately to create attachment records.
#[derive(Debug, Clone)]
pub struct RehomedAsset {
    /// Absolute path the reference resolved to inside the extracted tree.
    pub original_path: PathBuf,
    /// The reference text as it appeared in the HTML/CSS.
    pub original_src: String,
    /// Absolute path of the copy under managed storage.
    pub new_path: PathBuf,
    /// Public URL the reference was rewritten to.
    pub new_url: String,
    /// Generated collision-resistant file name.
    pub file_name: String,
    pub kind: AssetKind,
}

/// Rewrites image references in `html` to managed storage under
/// `upload_dir/courses/{course_id}/lessons/{lesson_id}/images/`, copying each
/// resolved asset there under a hash-suffixed name.
///
/// Returns the rewritten document plus the rehomed assets in rewrite order.
/// Only directory creation can fail; everything per-reference degrades to a
/// logged skip.
pub fn rehome_assets(
    html_path: &Path,
    html: &str,
    extracted_root: &Path,
    upload_dir: &Path,
    course_id: i64,
    lesson_id: i64,
) -> std::io::Result<(String, Vec<RehomedAsset>)> {
    let images_dir = upload_dir
        .join("courses")
        .join(course_id.to_string())
        .join("lessons")
        .join(lesson_id.to_string())
        .join("images");
    fs::create_dir_all(&images_dir)?;

    let mut assets: Vec<RehomedAsset> = Vec::new();

    let img_pattern = Regex::new(r#"(?i)<img[^>]*src=["']([^"']+)["'][^>]*>"#).unwrap();
    let src_pattern = Regex::new(r#"src=["'][^"']+["']"#).unwrap();
    let updated = img_pattern.replace_all(html, |caps: &Captures| {
        let img_tag = &caps[0];
        let img_src = &caps[1];
        match rehome_one(
            html_path,
            extracted_root,
            &images_dir,
            img_src,
            course_id,
            lesson_id,
            AssetKind::InlineImage,
        ) {
            Some(asset) => {
                let new_tag = src_pattern
                    .replace(img_tag, format!(r#"src="{}""#, asset.new_url).as_str())
                    .into_owned();
                assets.push(asset);
                new_tag
            }
            None => img_tag.to_string(),
        }
    });

    let bg_pattern =
        Regex::new(r#"(?i)background-image:\s*url\(["']?([^)"']+)["']?\)"#).unwrap();
    let updated = bg_pattern.replace_all(&updated, |caps: &Captures| {
        let full_match = &caps[0];
        let bg_url = &caps[1];
        match rehome_one(
            html_path,
            extracted_root,
            &images_dir,
            bg_url,
            course_id,
            lesson_id,
            AssetKind::BackgroundImage,
        ) {
            Some(asset) => {
                let new_decl = format!(r#"background-image: url("{}")"#, asset.new_url);
                assets.push(asset);
                new_decl
            }
            None => full_match.to_string(),
        }
    });

    Ok((updated.into_owned(), assets))
}

/// Resolves, copies and records a single reference. `None` means "leave the
/// reference as it was": external/inline URLs, unresolvable paths, and copy
/// failures all land there.
fn rehome_one(
    html_path: &Path,
    extracted_root: &Path,
    images_dir: &Path,
    reference: &str,
    course_id: i64,
    lesson_id: i64,
    kind: AssetKind,
) -> Option<RehomedAsset> {
    if reference.starts_with("data:")
        || reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("//")
    {
        return None;
    }

    let source_path = resolve_reference(html_path, extracted_root, reference)?;

    let file_hash = format!("{:x}", md5::compute(source_path.to_string_lossy().as_bytes()));
    let file_hash = &file_hash[..8];
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut extension = source_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        extension = ".bin".to_string();
    }

    let file_name = match kind {
        AssetKind::InlineImage => format!("{stem}_{file_hash}{extension}"),
        AssetKind::BackgroundImage => format!("{stem}_bg_{file_hash}{extension}"),
    };
    let new_path = images_dir.join(&file_name);

    if let Err(e) = fs::copy(&source_path, &new_path) {
        error!(
            error = ?e,
            source = %source_path.display(),
            destination = %new_path.display(),
            "Failed to copy asset, leaving reference unmodified"
        );
        return None;
    }
    info!(source = %source_path.display(), destination = %new_path.display(), "Copied asset");

    let new_url =
        format!("/uploads/courses/{course_id}/lessons/{lesson_id}/images/{file_name}");

    Some(RehomedAsset {
        original_path: source_path,
        original_src: reference.to_string(),
        new_path,
        new_url,
        file_name,
        kind,
    })
}

/// Tries the reference against several path variants, in order: relative to
/// the HTML file, the same URL-decoded, then relative to the extraction root
/// with any leading slash stripped, raw and URL-decoded. First existing
/// regular file wins.
fn resolve_reference(html_path: &Path, extracted_root: &Path, reference: &str) -> Option<PathBuf> {
    let html_dir = html_path.parent().unwrap_or(Path::new(""));
    let decoded = urlencoding::decode(reference)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| reference.to_string());
    let stripped = reference.trim_start_matches('/');
    let stripped_decoded = urlencoding::decode(stripped)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| stripped.to_string());

    let candidates = [
        html_dir.join(reference),
        html_dir.join(&decoded),
        extracted_root.join(stripped),
        extracted_root.join(&stripped_decoded),
    ];

    for candidate in candidates {
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    warn!(
        reference = reference,
        html = %html_path.display(),
        "Image reference not found in extracted tree"
    );
    None
}
