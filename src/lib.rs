//! Classroom attendance: a wizard that records one immutable session record
//! per class, and a reporting engine that turns stored records into
//! per-student, per-subject attendance figures.

pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod settings;
pub mod store;
pub mod utils;
pub mod wizard;

pub use db::Database;
pub use error::{AttendanceError, AttendanceResult};
pub use models::{
    AggregateRow, AttendanceEntry, BatchScope, Instructor, Percentage, SessionRecord, Student,
    StudentSummary, Subject, SubjectTable,
};
pub use report::{AttendanceReports, HeldCounting, ReportWindow, WindowKind};
pub use settings::{AttendanceSettings, SettingsStore};
pub use store::{MemoryStore, RecordStore, RosterProvider};
pub use wizard::{SessionWizard, WizardStage};
