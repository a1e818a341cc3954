//! In-process [`LessonStore`] implementation.
//!
//! Backs the CLI and integration tests; ids are sequential and contents are
//! inspectable after an import run.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::contract::{
    Attachment, Lesson, LessonStore, LessonUpdate, NewAttachment, NewLesson, StoreError,
};

#[derive(Debug, Default)]
struct Inner {
    lessons: Vec<Lesson>,
    attachments: Vec<Attachment>,
    next_lesson_id: i64,
    next_attachment_id: i64,
}

/// A memory-backed lesson store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lessons created so far.
    pub fn lessons(&self) -> Vec<Lesson> {
        self.inner.lock().expect("store mutex poisoned").lessons.clone()
    }

    /// Snapshot of all attachments created so far.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .attachments
            .clone()
    }
}

#[async_trait]
impl LessonStore for MemoryStore {
    async fn create_lesson(&self, req: NewLesson) -> Result<Lesson, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.next_lesson_id += 1;
        let lesson = Lesson {
            id: inner.next_lesson_id,
            course_id: req.course_id,
            title: req.title,
            content: req.content,
            order: req.order,
            scorm_data: None,
        };
        inner.lessons.push(lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(&self, lesson_id: i64, update: LessonUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let lesson = inner
            .lessons
            .iter_mut()
            .find(|l| l.id == lesson_id)
            .ok_or_else(|| format!("lesson {lesson_id} not found"))?;
        lesson.title = update.title;
        lesson.content = update.content;
        lesson.scorm_data = update.scorm_data;
        Ok(())
    }

    async fn create_attachment(&self, req: NewAttachment) -> Result<Attachment, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.next_attachment_id += 1;
        let attachment = Attachment {
            id: inner.next_attachment_id,
            lesson_id: req.lesson_id,
            file_name: req.file_name,
            file_path: req.file_path,
            file_size: req.file_size,
            mime_type: req.mime_type,
            is_video: req.is_video,
        };
        inner.attachments.push(attachment.clone());
        Ok(attachment)
    }
}
