//! Archive extraction, manifest location and content classification.

use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::manifest::{parse_manifest, Manifest, ManifestError};

/// Everything known about an extracted package: parsed manifest fields plus
/// the classified content of the extracted tree.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    pub manifest: Manifest,
    pub extracted_path: PathBuf,
    pub html_files: Vec<PathBuf>,
    pub image_files: Vec<PathBuf>,
    pub other_files: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum ExtractError {
    Io(std::io::Error),
    Archive(zip::result::ZipError),
    /// No `imsmanifest.xml` (or `*manifest*.xml` variant) anywhere in the tree.
    ManifestNotFound,
    Manifest(ManifestError),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "package extraction I/O failure: {e}"),
            ExtractError::Archive(e) => write!(f, "failed to read package archive: {e}"),
            ExtractError::ManifestNotFound => {
                write!(f, "no imsmanifest.xml found in the package")
            }
            ExtractError::Manifest(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io(e) => Some(e),
            ExtractError::Archive(e) => Some(e),
            ExtractError::ManifestNotFound => None,
            ExtractError::Manifest(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::Io(e)
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(e: zip::result::ZipError) -> Self {
        ExtractError::Archive(e)
    }
}

impl From<ManifestError> for ExtractError {
    fn from(e: ManifestError) -> Self {
        ExtractError::Manifest(e)
    }
}

const HTML_EXTENSIONS: &[&str] = &["html", "htm"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];
/// Scan pass extensions; the scan deliberately excludes webp, which only
/// enters the image bucket via the manifest.
const SCAN_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg"];

/// Unpacks a package archive and classifies its content.
///
/// Destructive: an existing `destination` is wiped and recreated. On any
/// failure after the wipe the destination is removed again best-effort and
/// the error propagates.
pub fn extract_package(
    archive_path: &Path,
    destination: &Path,
) -> Result<PackageMetadata, ExtractError> {
    if destination.exists() {
        fs::remove_dir_all(destination)?;
    }
    fs::create_dir_all(destination)?;

    match extract_into(archive_path, destination) {
        Ok(metadata) => Ok(metadata),
        Err(e) => {
            error!(error = %e, path = %destination.display(), "Package extraction failed, cleaning up");
            if let Err(cleanup) = fs::remove_dir_all(destination) {
                debug!(error = ?cleanup, "Cleanup of failed extraction also failed");
            }
            Err(e)
        }
    }
}

fn extract_into(archive_path: &Path, destination: &Path) -> Result<PackageMetadata, ExtractError> {
    info!(archive = %archive_path.display(), destination = %destination.display(), "Extracting package");

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel_path) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry escaping the extraction root");
            continue;
        };
        let out_path = destination.join(rel_path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }

    // Platform cruft left behind by macOS zip tools.
    let macosx = destination.join("__MACOSX");
    if macosx.exists() {
        fs::remove_dir_all(&macosx)?;
    }

    let manifest_path = locate_manifest(destination).ok_or(ExtractError::ManifestNotFound)?;
    let manifest = parse_manifest(&manifest_path)?;

    let (html_files, image_files, other_files) = classify_files(destination, &manifest)?;
    info!(
        html = html_files.len(),
        images = image_files.len(),
        other = other_files.len(),
        "Classified package files"
    );

    Ok(PackageMetadata {
        manifest,
        extracted_path: destination.to_path_buf(),
        html_files,
        image_files,
        other_files,
    })
}

/// Search order: exact root match, then recursive exact-name search, then any
/// `*manifest*.xml`. Traversal is sorted so the first match is deterministic.
fn locate_manifest(destination: &Path) -> Option<PathBuf> {
    let root_manifest = destination.join("imsmanifest.xml");
    if root_manifest.exists() {
        return Some(root_manifest);
    }

    if let Some(found) = find_file(destination, &|name| name == "imsmanifest.xml") {
        info!(path = %found.display(), "Found nested manifest");
        return Some(found);
    }

    if let Some(found) = find_file(destination, &|name| {
        name.contains("manifest") && name.ends_with(".xml")
    }) {
        info!(path = %found.display(), "Found alternative manifest");
        return Some(found);
    }

    None
}

/// Depth-first search for the first file whose lowercased name satisfies the
/// predicate, visiting entries in sorted order.
fn find_file(dir: &Path, matches: &dyn Fn(&str) -> bool) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_file() {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_lowercase();
            if matches(&name) {
                return Some(path);
            }
        } else if path.is_dir() {
            if let Some(found) = find_file(&path, matches) {
                return Some(found);
            }
        }
    }
    None
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

type Buckets = (Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>);

/// Two independent discovery passes merged by de-duplication: the manifest's
/// resource listings first, then a full filesystem scan. Manifests are
/// frequently incomplete or wrong about which files actually exist.
fn classify_files(destination: &Path, manifest: &Manifest) -> Result<Buckets, ExtractError> {
    let mut html_files: Vec<PathBuf> = Vec::new();
    let mut image_files: Vec<PathBuf> = Vec::new();
    let mut other_files: Vec<PathBuf> = Vec::new();

    for resource in &manifest.resources {
        for file in &resource.files {
            if file.is_empty() {
                continue;
            }
            let full_path = destination.join(file);
            if !full_path.exists() {
                debug!(file = file, "Manifest-declared file missing from package");
                continue;
            }
            let ext = extension_of(&full_path);
            if HTML_EXTENSIONS.contains(&ext.as_str()) {
                if !html_files.contains(&full_path) {
                    html_files.push(full_path);
                }
            } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                if !image_files.contains(&full_path) {
                    image_files.push(full_path);
                }
            } else if !other_files.contains(&full_path) {
                other_files.push(full_path);
            }
        }
    }

    let mut scanned: Vec<PathBuf> = Vec::new();
    collect_files(destination, &mut scanned)?;

    for ext in HTML_EXTENSIONS {
        for path in scanned.iter().filter(|p| extension_of(p) == *ext) {
            if !html_files.contains(path) {
                html_files.push(path.clone());
            }
        }
    }
    for ext in SCAN_IMAGE_EXTENSIONS {
        for path in scanned.iter().filter(|p| extension_of(p) == *ext) {
            if !image_files.contains(path) {
                image_files.push(path.clone());
            }
        }
    }

    Ok((html_files, image_files, other_files))
}

fn collect_files(dir: &Path, results: &mut Vec<PathBuf>) -> Result<(), ExtractError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, results)?;
        } else if path.is_file() {
            results.push(path);
        }
    }
    Ok(())
}
