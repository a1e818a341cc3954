//! High-level pipeline: orchestrates extract → rehome → convert → persist
//! for one uploaded package.
//!
//! This module drives a whole import as a single sequential unit of work:
//!   - Writes the uploaded bytes to a scoped temporary file
//!   - Extracts the archive into a collision-safe destination under the
//!     configured scratch directory (see [`crate::extract`])
//!   - For each discovered HTML file, in discovery order: creates a lesson
//!     row, rehomes its image assets, transliterates to Markdown, updates the
//!     lesson and records one attachment per asset
//!   - Aggregates per-file successes and failures into an [`ImportSummary`]
//!
//! # Error handling
//! Partial success is the expected outcome, not an anomaly: any error while
//! processing one HTML file is recorded as a failure entry and the batch
//! continues with the next file. Only filename validation, temp-file I/O and
//! extraction failures are fatal to the whole import.
//!
//! # Resource lifetimes
//! The temporary upload file is removed on every exit path (drop of the
//! scoped temp directory). The extracted tree outlives the call on purpose:
//! its removal is handed to a fire-and-forget background task so pending
//! responses can still reference extracted content.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::contract::{LessonStore, LessonUpdate, NewAttachment, NewLesson};
use crate::encoding::read_text_file;
use crate::extract::{extract_package, ExtractError, PackageMetadata};
use crate::markdown::html_to_markdown;
use crate::rehome::rehome_assets;

/// Archive extensions accepted for import.
const ACCEPTED_EXTENSIONS: &[&str] = &["zip", "scorm", "pif"];

/// Aggregate counts for one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportCounts {
    pub total_files_found: usize,
    pub lessons_created: usize,
    pub failed_conversions: usize,
    pub total_images_found: usize,
    pub images_processed: usize,
}

/// Descriptor of one created lesson.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedLesson {
    pub id: i64,
    pub title: String,
    pub file: String,
    pub content_length: usize,
    pub images_count: usize,
}

/// One HTML file that failed conversion; never fatal to the batch.
#[derive(Debug, Clone, Serialize)]
pub struct FailedConversion {
    pub file: String,
    pub error: String,
}

/// Manifest-level metadata echoed back in the summary.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub organizations: usize,
    pub resources: usize,
}

/// The result of one import call. Produced once, never persisted; its serde
/// shape is the response contract for callers that expose it over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub message: String,
    pub summary: ImportCounts,
    pub lessons_created: Vec<CreatedLesson>,
    pub failed_conversions: Option<Vec<FailedConversion>>,
    pub metadata: ManifestSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Fatal import failures; per-file conversion errors never surface here.
#[derive(Debug)]
pub enum ImportError {
    /// The uploaded filename has no base name.
    MissingFileName,
    /// The extension is not one of `.zip`, `.scorm`, `.pif`.
    InvalidArchiveType(String),
    /// Temp-file write/read failure.
    Io(std::io::Error),
    /// The archive could not be extracted or its manifest parsed.
    Extract(ExtractError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::MissingFileName => write!(f, "filename is required"),
            ImportError::InvalidArchiveType(ext) => write!(
                f,
                "file must be a ZIP or SCORM package (.zip, .scorm, .pif), got {ext:?}"
            ),
            ImportError::Io(e) => write!(f, "failed to store uploaded package: {e}"),
            ImportError::Extract(e) => write!(f, "failed to import package: {e}"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::MissingFileName | ImportError::InvalidArchiveType(_) => None,
            ImportError::Io(e) => Some(e),
            ImportError::Extract(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        ImportError::Io(e)
    }
}

impl From<ExtractError> for ImportError {
    fn from(e: ExtractError) -> Self {
        ImportError::Extract(e)
    }
}

/// Why a single HTML file failed to convert. Caught at the orchestrator
/// boundary and degraded to a [`FailedConversion`] entry whose message names
/// the kind, so unclassified errors stay visible instead of being dropped.
#[derive(Debug)]
enum ConvertError {
    Read(std::io::Error),
    Rehome(std::io::Error),
    Store(crate::contract::StoreError),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Read(e) => write!(f, "reading source HTML failed: {e}"),
            ConvertError::Rehome(e) => write!(f, "asset rehoming failed: {e}"),
            ConvertError::Store(e) => write!(f, "persistence failed: {e}"),
        }
    }
}

/// Imports one uploaded package into a course.
///
/// `archive` is the raw uploaded bytes, `file_name` the name it was uploaded
/// under. Lessons and attachments are created through `store`; the caller is
/// responsible for prior authorization.
pub async fn import_package<S>(
    archive: &[u8],
    file_name: &str,
    course_id: i64,
    store: &S,
    config: &Config,
) -> Result<ImportSummary, ImportError>
where
    S: LessonStore + ?Sized,
{
    validate_file_name(file_name)?;

    info!(course_id, file_name, size = archive.len(), "Starting package import");

    // Scoped upload storage: dropping the TempDir removes the uploaded file
    // on every exit path.
    let temp_dir = tempfile::Builder::new().prefix("scorm_import_").tempdir()?;
    let base_name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package.zip".to_string());
    let temp_file_path = temp_dir.path().join(base_name);
    std::fs::write(&temp_file_path, archive)?;
    info!(path = %temp_file_path.display(), size = archive.len(), "Uploaded package stored");

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let extract_dir = config
        .scorm_dir
        .join(format!("course_{}_{}", course_id, &suffix[..8]));

    let result = run_import(&temp_file_path, course_id, store, config, &extract_dir).await;

    match result {
        Ok(summary) => {
            drop(temp_dir);
            schedule_cleanup(extract_dir);
            Ok(summary)
        }
        Err(e) => {
            error!(error = %e, course_id, "Package import failed");
            drop(temp_dir);
            if extract_dir.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&extract_dir) {
                    warn!(error = ?cleanup, path = %extract_dir.display(), "Cleanup of extraction directory failed");
                }
            }
            Err(e)
        }
    }
}

async fn run_import<S>(
    archive_path: &Path,
    course_id: i64,
    store: &S,
    config: &Config,
    extract_dir: &Path,
) -> Result<ImportSummary, ImportError>
where
    S: LessonStore + ?Sized,
{
    let metadata = extract_package(archive_path, extract_dir)?;

    info!(
        html_files = metadata.html_files.len(),
        image_files = metadata.image_files.len(),
        "Package extracted"
    );

    let mut lessons_created: Vec<CreatedLesson> = Vec::new();
    let mut failed_conversions: Vec<FailedConversion> = Vec::new();

    let html_count = metadata.html_files.len();
    for (index, html_file) in metadata.html_files.iter().enumerate() {
        info!(index = index + 1, file = %html_file.display(), "Processing lesson source");
        match convert_one(html_file, index, html_count, course_id, store, config, &metadata).await {
            Ok(created) => {
                info!(lesson_id = created.id, title = %created.title, images = created.images_count, "Created lesson");
                lessons_created.push(created);
            }
            Err(e) => {
                error!(file = %html_file.display(), error = %e, "Lesson conversion failed");
                failed_conversions.push(FailedConversion {
                    file: html_file.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(build_summary(&metadata, lessons_created, failed_conversions))
}

async fn convert_one<S>(
    html_file: &Path,
    index: usize,
    html_count: usize,
    course_id: i64,
    store: &S,
    config: &Config,
    metadata: &PackageMetadata,
) -> Result<CreatedLesson, ConvertError>
where
    S: LessonStore + ?Sized,
{
    let file_stem = html_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| html_file.display().to_string());
    let title = if html_count > 1 {
        format!("Lesson {}: {}", index + 1, file_stem)
    } else {
        file_stem.clone()
    };

    // Create the row up front so the lesson id is available for asset paths.
    let lesson = store
        .create_lesson(NewLesson {
            course_id,
            title: title.clone(),
            content: "Converting...".to_string(),
            order: index,
        })
        .await
        .map_err(ConvertError::Store)?;

    let html_content = read_text_file(html_file).map_err(ConvertError::Read)?;
    let (rehomed_html, assets) = rehome_assets(
        html_file,
        &html_content,
        &metadata.extracted_path,
        &config.upload_dir,
        course_id,
        lesson.id,
    )
    .map_err(ConvertError::Rehome)?;
    let markdown = html_to_markdown(&rehomed_html);

    let scorm_data = serde_json::json!({
        "source_file": html_file.display().to_string(),
        "scorm_metadata": {
            "title": metadata.manifest.title,
            "description": metadata.manifest.description,
            "encoding_used": metadata.manifest.encoding_used,
        },
        "original_file_name": file_stem,
        "imported_from_scorm": true,
        "images_count": assets.len(),
    });

    store
        .update_lesson(
            lesson.id,
            LessonUpdate {
                title: title.clone(),
                content: markdown.clone(),
                scorm_data: Some(scorm_data),
            },
        )
        .await
        .map_err(ConvertError::Store)?;

    for asset in &assets {
        let file_size = std::fs::metadata(&asset.new_path)
            .map_err(ConvertError::Read)?
            .len();
        store
            .create_attachment(NewAttachment {
                lesson_id: lesson.id,
                file_name: asset.file_name.clone(),
                file_path: asset.new_path.clone(),
                file_size,
                mime_type: mime_type_for(&asset.file_name).to_string(),
                is_video: false,
            })
            .await
            .map_err(ConvertError::Store)?;
        info!(lesson_id = lesson.id, file = %asset.file_name, "Created attachment");
    }

    Ok(CreatedLesson {
        id: lesson.id,
        title,
        file: html_file.display().to_string(),
        content_length: markdown.len(),
        images_count: assets.len(),
    })
}

fn build_summary(
    metadata: &PackageMetadata,
    lessons_created: Vec<CreatedLesson>,
    failed_conversions: Vec<FailedConversion>,
) -> ImportSummary {
    let images_processed = lessons_created.iter().map(|l| l.images_count).sum();
    let warning = if failed_conversions.is_empty() {
        None
    } else {
        Some(format!(
            "Failed to convert {} file(s)",
            failed_conversions.len()
        ))
    };

    info!(
        lessons = lessons_created.len(),
        failures = failed_conversions.len(),
        "Import finished"
    );

    ImportSummary {
        message: "SCORM package processed successfully".to_string(),
        summary: ImportCounts {
            total_files_found: metadata.html_files.len(),
            lessons_created: lessons_created.len(),
            failed_conversions: failed_conversions.len(),
            total_images_found: metadata.image_files.len(),
            images_processed,
        },
        lessons_created,
        failed_conversions: if failed_conversions.is_empty() {
            None
        } else {
            Some(failed_conversions)
        },
        metadata: ManifestSummary {
            title: metadata.manifest.title.clone(),
            description: metadata.manifest.description.clone(),
            organizations: metadata.manifest.organizations.len(),
            resources: metadata.manifest.resources.len(),
        },
        warning,
    }
}

/// MIME type for an attachment, from its extension.
fn mime_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn validate_file_name(file_name: &str) -> Result<(), ImportError> {
    let path = Path::new(file_name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if stem.is_empty() {
        return Err(ImportError::MissingFileName);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ImportError::InvalidArchiveType(format!(".{ext}")));
    }
    Ok(())
}

/// Hands the extracted tree to a fire-and-forget background task. Must not
/// be awaited and must not block the caller.
fn schedule_cleanup(extract_dir: PathBuf) {
    tokio::spawn(async move {
        match std::fs::remove_dir_all(&extract_dir) {
            Ok(()) => info!(path = %extract_dir.display(), "Cleaned up extracted package"),
            Err(e) => warn!(error = ?e, path = %extract_dir.display(), "Failed to clean up extracted package"),
        }
    });
}
