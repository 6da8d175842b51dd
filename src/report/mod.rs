//! Attendance reporting: date windows, the aggregation engine, and the
//! views built on top of a record store.

mod collector;
pub mod engine;
mod window;

pub use collector::{collect_subject_records, fetch_subject_records, SubjectRecords};
pub use engine::{
    aggregate_student, classes_attended, classes_held, classes_held_for, percentage,
    student_summary, subject_table, HeldCounting,
};
pub use window::{filter_by_window, ReportWindow, WindowKind};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;

use crate::{
    error::AttendanceResult,
    models::{AggregateRow, StudentSummary, Subject, SubjectTable},
    settings::AttendanceSettings,
    store::RecordStore,
};

/// Report queries over a record store. Nothing is cached: every call reads
/// the store again and recomputes.
pub struct AttendanceReports<S: RecordStore + ?Sized> {
    store: Arc<S>,
    counting: HeldCounting,
    default_window: WindowKind,
}

impl<S: RecordStore + ?Sized> Clone for AttendanceReports<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            counting: self.counting,
            default_window: self.default_window,
        }
    }
}

impl<S: RecordStore + ?Sized> AttendanceReports<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            counting: HeldCounting::default(),
            default_window: WindowKind::default(),
        }
    }

    /// Takes the configured default window.
    pub fn with_settings(mut self, settings: &AttendanceSettings) -> Self {
        self.default_window = settings.default_window;
        self
    }

    pub fn with_counting(mut self, counting: HeldCounting) -> Self {
        self.counting = counting;
        self
    }

    pub fn counting(&self) -> HeldCounting {
        self.counting
    }

    /// The configured default window. A `Custom` default has no bounds to
    /// resolve and is a validation error.
    pub fn default_window(&self) -> AttendanceResult<ReportWindow> {
        ReportWindow::from_kind(self.default_window, None)
    }

    /// One student's figures for one subject. Read failures are returned to
    /// the caller.
    pub async fn student_aggregate(
        &self,
        subject_code: &str,
        student_id: &str,
        window: &ReportWindow,
        now: DateTime<Utc>,
    ) -> AttendanceResult<AggregateRow> {
        let records = fetch_subject_records(self.store.as_ref(), subject_code).await?;
        let filtered = filter_by_window(&records, window, now);
        Ok(aggregate_student(&filtered, student_id, self.counting))
    }

    /// Faculty table for one subject. A failed read yields an empty table
    /// with `read_failed` set.
    pub async fn subject_table(
        &self,
        subject_code: &str,
        window: &ReportWindow,
        now: DateTime<Utc>,
    ) -> SubjectTable {
        match fetch_subject_records(self.store.as_ref(), subject_code).await {
            Ok(records) => {
                let filtered = filter_by_window(&records, window, now);
                subject_table(subject_code, &filtered, self.counting)
            }
            Err(err) => {
                warn!("Subject table for {subject_code} degraded to no data: {err}");
                SubjectTable {
                    subject_code: subject_code.to_string(),
                    sessions: Vec::new(),
                    rows: Vec::new(),
                    read_failed: true,
                }
            }
        }
    }

    /// Cross-subject dashboard for one student over `subjects`, in order.
    pub async fn student_summary(
        &self,
        student_id: &str,
        subjects: &[Subject],
        window: &ReportWindow,
        now: DateTime<Utc>,
    ) -> StudentSummary {
        let mut collected = collect_subject_records(self.store.as_ref(), subjects).await;
        for entry in &mut collected {
            entry.records = filter_by_window(&entry.records, window, now);
        }
        student_summary(student_id, &collected, self.counting)
    }
}
