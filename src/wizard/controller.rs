use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AttendanceError, AttendanceResult},
    log_error, log_info, log_warn,
    models::{Instructor, SessionRecord, Subject},
    settings::{AttendanceSettings, SessionKeyStrategy, SessionTimeOption},
    store::{RecordStore, RosterProvider},
};

use super::{CommitOutcome, ConfirmationSummary, StudentMark, WizardStage, WizardState};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub stage: WizardStage,
    pub subject: Option<Subject>,
    pub session_time: Option<String>,
    pub batch: Option<u32>,
    pub can_proceed: bool,
    /// Batch-filtered roster as currently toggled.
    pub students: Vec<StudentMark>,
    pub summary: ConfirmationSummary,
    pub outcome: Option<CommitOutcome>,
    pub failure: Option<String>,
}

pub fn generate_session_key(captured_at: DateTime<Utc>, strategy: SessionKeyStrategy) -> String {
    let stamp = captured_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    match strategy {
        SessionKeyStrategy::Timestamp => stamp,
        SessionKeyStrategy::TimestampWithNonce => format!("{stamp}_{}", Uuid::new_v4().simple()),
    }
}

/// Drives one instructor through recording a single attendance session.
///
/// The wizard owns its state; two wizards never share toggles, even for the
/// same subject. Operations on one wizard are serialized by its lock, which
/// is held across collaborator calls so a commit always records the state
/// that was confirmed.
pub struct SessionWizard<S: RecordStore + ?Sized, R: RosterProvider + ?Sized> {
    state: Mutex<WizardState>,
    store: Arc<S>,
    roster: Arc<R>,
    instructor: Instructor,
    settings: AttendanceSettings,
}

impl<S: RecordStore + ?Sized, R: RosterProvider + ?Sized> SessionWizard<S, R> {
    pub fn new(
        store: Arc<S>,
        roster: Arc<R>,
        instructor: Instructor,
        settings: AttendanceSettings,
    ) -> Self {
        Self {
            state: Mutex::new(WizardState::new()),
            store,
            roster,
            instructor,
            settings,
        }
    }

    pub fn instructor(&self) -> &Instructor {
        &self.instructor
    }

    pub fn session_time_options(&self) -> &[SessionTimeOption] {
        &self.settings.session_times
    }

    pub fn batch_options(&self) -> &[u32] {
        &self.settings.batches
    }

    pub async fn stage(&self) -> WizardStage {
        self.state.lock().await.stage
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let state = self.state.lock().await;
        WizardSnapshot {
            stage: state.stage,
            subject: state.subject.clone(),
            session_time: state.session_time.clone(),
            batch: state.batch,
            can_proceed: state.can_proceed(),
            students: state.visible_marks().cloned().collect(),
            summary: state.summary(),
            outcome: state.outcome,
            failure: state.failure.clone(),
        }
    }

    /// Loads the instructor's subject catalogue. Only valid while parameters
    /// are being chosen. A failed read leaves the catalogue empty and is
    /// reported to the caller.
    pub async fn load_subjects(&self) -> AttendanceResult<Vec<Subject>> {
        let mut state = self.state.lock().await;
        state.expect_stage(WizardStage::SelectParameters, "load subjects")?;
        match self.roster.get_subjects(&self.instructor.id).await {
            Ok(subjects) => {
                state.set_subjects(subjects.clone())?;
                Ok(subjects)
            }
            Err(err) => {
                log_warn!("Failed to load subjects for {}: {err:#}", self.instructor.id);
                state.set_subjects(Vec::new())?;
                Err(AttendanceError::store_read("subject catalogue", &err))
            }
        }
    }

    pub async fn select_subject(&self, code: &str) -> AttendanceResult<()> {
        self.state.lock().await.select_subject(code)
    }

    pub async fn select_session_time(&self, value: &str) -> AttendanceResult<()> {
        self.state
            .lock()
            .await
            .select_session_time(value, &self.settings)
    }

    pub async fn select_batch(&self, batch: Option<u32>) -> AttendanceResult<()> {
        self.state.lock().await.select_batch(batch, &self.settings)
    }

    /// Moves to MarkAttendance with the roster loaded and everyone present.
    /// If the roster cannot be read the stage still advances with nobody to
    /// mark, which the commit step will refuse.
    pub async fn proceed(&self) -> AttendanceResult<Vec<StudentMark>> {
        let mut state = self.state.lock().await;
        state.check_can_proceed()?;

        let students = match self.roster.get_students().await {
            Ok(students) => students,
            Err(err) => {
                log_warn!("Roster unavailable, continuing with no students: {err:#}");
                Vec::new()
            }
        };

        state.begin_marking(students)?;
        Ok(state.visible_marks().cloned().collect())
    }

    pub async fn back(&self) -> AttendanceResult<()> {
        self.state.lock().await.back_to_parameters()
    }

    pub async fn toggle(&self, student_id: &str) -> AttendanceResult<bool> {
        self.state.lock().await.toggle(student_id)
    }

    pub async fn visible_students(&self) -> Vec<StudentMark> {
        self.state.lock().await.visible_marks().cloned().collect()
    }

    pub async fn submit(&self) -> AttendanceResult<ConfirmationSummary> {
        self.state.lock().await.submit()
    }

    pub async fn cancel(&self) -> AttendanceResult<()> {
        self.state.lock().await.cancel_confirm()
    }

    /// Records the confirmed session. Validation failures keep the wizard in
    /// Confirm; a store failure moves it to Failed and is not retried.
    pub async fn commit(&self) -> AttendanceResult<SessionRecord> {
        let mut state = self.state.lock().await;
        let pending = state.prepare_commit()?;

        let captured_at = Utc::now();
        let session_key = generate_session_key(captured_at, self.settings.key_strategy);
        let record = SessionRecord::new(
            pending.subject_code.clone(),
            session_key.clone(),
            captured_at,
            pending.session_time,
            pending.batch,
            pending.entries,
            self.instructor.id.clone(),
        )?;

        log_info!(
            "Committing attendance for {} ({} present, {} absent, batch {})",
            record.subject_code,
            record.present_count,
            record.absent_count,
            record.batch
        );

        match self
            .store
            .append(&pending.subject_code, &session_key, &record)
            .await
        {
            Ok(()) => {
                state.mark_recorded(CommitOutcome {
                    present_count: record.present_count,
                    absent_count: record.absent_count,
                });
                log_info!("Attendance recorded as {session_key}");
                Ok(record)
            }
            Err(err) => {
                log_error!(
                    "Failed to record attendance for {}: {err:#}",
                    pending.subject_code
                );
                let error = AttendanceError::store_write(&pending.subject_code, &err);
                state.mark_failed(error.to_string());
                Err(error)
            }
        }
    }

    /// From Recorded or Failed, starts over at SelectParameters.
    pub async fn reset(&self) -> AttendanceResult<()> {
        self.state.lock().await.reset()
    }
}
