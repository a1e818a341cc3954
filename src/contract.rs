//! # contract: persistence interface consumed by the import pipeline
//!
//! The pipeline never talks to a database directly. Lesson and attachment
//! persistence go through the [`LessonStore`] trait, implemented by the real
//! application store, by [`crate::store::MemoryStore`] for the CLI, and by
//! `mockall` mocks in tests.
//!
//! All methods are async and return boxed error trait objects; implementors
//! convert their upstream failures into those. The trait is annotated for
//! `mockall` so consumers can generate deterministic mocks.

use std::path::PathBuf;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Uniform error type for store operations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// The minimum data needed to create a lesson row.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub course_id: i64,
    pub title: String,
    pub content: String,
    /// Position within the course, assigned in discovery order.
    pub order: usize,
}

/// A created/returned lesson.
#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: String,
    pub order: usize,
    /// Import provenance metadata, set once conversion finishes.
    pub scorm_data: Option<serde_json::Value>,
}

/// Fields updated on a lesson after conversion completes.
#[derive(Debug, Clone)]
pub struct LessonUpdate {
    pub title: String,
    pub content: String,
    pub scorm_data: Option<serde_json::Value>,
}

/// The minimum data needed to create an attachment row for a rehomed asset.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub lesson_id: i64,
    pub file_name: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub mime_type: String,
    pub is_video: bool,
}

/// A created/returned attachment.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: i64,
    pub lesson_id: i64,
    pub file_name: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub mime_type: String,
    pub is_video: bool,
}

/// Trait for creating and updating lessons and attachments during an import.
///
/// The pipeline is invoked only after the caller has been authorized against
/// the course; implementors do not re-check permissions.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Create a lesson row and return it with its assigned id.
    async fn create_lesson(&self, req: NewLesson) -> Result<Lesson, StoreError>;

    /// Update a lesson's title, content and provenance metadata.
    async fn update_lesson(&self, lesson_id: i64, update: LessonUpdate) -> Result<(), StoreError>;

    /// Create one attachment row for a rehomed asset.
    async fn create_attachment(&self, req: NewAttachment) -> Result<Attachment, StoreError>;
}
