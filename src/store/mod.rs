//! Collaborator boundaries: where attendance records are kept and where the
//! roster comes from. Implementations report failures as `anyhow` errors;
//! the wizard and report layers convert them into `AttendanceError`.

mod memory;

pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{SessionRecord, Student, Subject};

/// Per-subject log of committed session records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends `record` under `subject_code`. `key` is opaque and must be
    /// unique within the subject; an existing key is an error, never an
    /// overwrite.
    async fn append(&self, subject_code: &str, key: &str, record: &SessionRecord) -> Result<()>;

    /// Records of one subject in the order they were appended.
    async fn list(&self, subject_code: &str) -> Result<Vec<SessionRecord>>;
}

#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// Subjects taught by `user_id`, in catalogue order.
    async fn get_subjects(&self, user_id: &str) -> Result<Vec<Subject>>;

    /// Enrolled students in roster order.
    async fn get_students(&self) -> Result<Vec<Student>>;
}
