use serde::{Deserialize, Serialize};

use crate::{
    error::{AttendanceError, AttendanceResult},
    models::{AttendanceEntry, BatchScope, Student, Subject},
    settings::AttendanceSettings,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WizardStage {
    SelectParameters,
    MarkAttendance,
    Confirm,
    Recorded,
    Failed,
}

impl Default for WizardStage {
    fn default() -> Self {
        WizardStage::SelectParameters
    }
}

impl WizardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStage::SelectParameters => "SelectParameters",
            WizardStage::MarkAttendance => "MarkAttendance",
            WizardStage::Confirm => "Confirm",
            WizardStage::Recorded => "Recorded",
            WizardStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardStage::Recorded | WizardStage::Failed)
    }
}

/// A roster student with the presence toggled in this session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentMark {
    pub student_id: String,
    pub display_name: String,
    pub batch: Option<u32>,
    pub present: bool,
}

impl From<Student> for StudentMark {
    fn from(student: Student) -> Self {
        Self {
            student_id: student.id,
            display_name: student.display_name,
            batch: student.batch,
            present: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSummary {
    pub present_count: u32,
    pub absent_count: u32,
    /// Absent students in roster order.
    pub absentees: Vec<StudentMark>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub present_count: u32,
    pub absent_count: u32,
}

/// Everything a commit needs, captured from the Confirm stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit {
    pub subject_code: String,
    pub session_time: String,
    pub batch: BatchScope,
    pub entries: Vec<AttendanceEntry>,
}

/// In-memory state of one attendance-taking session. Transitions that are
/// rejected leave the state untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub stage: WizardStage,
    /// Subject catalogue of the acting instructor.
    pub subjects: Vec<Subject>,
    pub subject: Option<Subject>,
    pub session_time: Option<String>,
    pub batch: Option<u32>,
    /// Full roster as loaded; the batch filter is applied on read.
    pub marks: Vec<StudentMark>,
    pub outcome: Option<CommitOutcome>,
    pub failure: Option<String>,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn expect_stage(
        &self,
        expected: WizardStage,
        action: &'static str,
    ) -> AttendanceResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(AttendanceError::InvalidTransition {
                action,
                stage: self.stage.as_str(),
            })
        }
    }

    /// Replaces the subject catalogue. Only allowed while parameters are
    /// still being chosen; a selected subject missing from the new catalogue
    /// is cleared along with its batch.
    pub fn set_subjects(&mut self, subjects: Vec<Subject>) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::SelectParameters, "load subjects")?;
        if let Some(selected) = &self.subject {
            if !subjects.iter().any(|subject| subject.code == selected.code) {
                self.subject = None;
                self.batch = None;
            }
        }
        self.subjects = subjects;
        Ok(())
    }

    pub fn select_subject(&mut self, code: &str) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::SelectParameters, "select a subject")?;
        let subject = self
            .subjects
            .iter()
            .find(|subject| subject.code == code)
            .cloned()
            .ok_or_else(|| AttendanceError::validation(format!("unknown subject {code}")))?;

        if !subject.is_lab {
            self.batch = None;
        }
        self.subject = Some(subject);
        Ok(())
    }

    pub fn select_session_time(
        &mut self,
        value: &str,
        settings: &AttendanceSettings,
    ) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::SelectParameters, "select a session time")?;
        let value = value.trim();
        if value.is_empty() {
            return Err(AttendanceError::validation("session time must not be empty"));
        }
        if !settings.is_known_session_time(value) {
            return Err(AttendanceError::validation(format!(
                "unknown session time {value}"
            )));
        }
        self.session_time = Some(value.to_string());
        Ok(())
    }

    pub fn select_batch(
        &mut self,
        batch: Option<u32>,
        settings: &AttendanceSettings,
    ) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::SelectParameters, "select a batch")?;
        if let Some(number) = batch {
            let is_lab = self.subject.as_ref().is_some_and(|subject| subject.is_lab);
            if !is_lab {
                return Err(AttendanceError::validation(
                    "a batch can only be selected for a lab subject",
                ));
            }
            if !settings.is_known_batch(number) {
                return Err(AttendanceError::validation(format!("unknown batch {number}")));
            }
        }
        self.batch = batch;
        Ok(())
    }

    pub fn can_proceed(&self) -> bool {
        self.stage == WizardStage::SelectParameters
            && self.subject.is_some()
            && self.session_time.is_some()
    }

    pub fn check_can_proceed(&self) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::SelectParameters, "start marking")?;
        if self.subject.is_none() {
            return Err(AttendanceError::validation("select a subject first"));
        }
        if self.session_time.is_none() {
            return Err(AttendanceError::validation("select a session time first"));
        }
        Ok(())
    }

    /// Loads the roster with everyone marked present.
    pub fn begin_marking(&mut self, students: Vec<Student>) -> AttendanceResult<()> {
        self.check_can_proceed()?;
        self.marks = students.into_iter().map(StudentMark::from).collect();
        self.stage = WizardStage::MarkAttendance;
        Ok(())
    }

    /// Returns to parameter selection; the marked roster is dropped.
    pub fn back_to_parameters(&mut self) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::MarkAttendance, "go back")?;
        self.marks.clear();
        self.stage = WizardStage::SelectParameters;
        Ok(())
    }

    fn in_scope(&self, mark: &StudentMark) -> bool {
        match self.batch {
            Some(batch) => mark.batch == Some(batch),
            None => true,
        }
    }

    /// Roster entries covered by the current batch selection, in roster order.
    pub fn visible_marks(&self) -> impl Iterator<Item = &StudentMark> {
        self.marks.iter().filter(move |mark| self.in_scope(mark))
    }

    /// Flips one visible student's presence and returns the new value.
    pub fn toggle(&mut self, student_id: &str) -> AttendanceResult<bool> {
        self.expect_stage(WizardStage::MarkAttendance, "toggle attendance")?;
        let batch = self.batch;
        let mark = self
            .marks
            .iter_mut()
            .find(|mark| mark.student_id == student_id)
            .filter(|mark| batch.map_or(true, |b| mark.batch == Some(b)))
            .ok_or_else(|| {
                AttendanceError::validation(format!("student {student_id} is not in this session"))
            })?;
        mark.present = !mark.present;
        Ok(mark.present)
    }

    pub fn summary(&self) -> ConfirmationSummary {
        let mut present_count = 0;
        let mut absentees = Vec::new();
        for mark in self.visible_marks() {
            if mark.present {
                present_count += 1;
            } else {
                absentees.push(mark.clone());
            }
        }
        ConfirmationSummary {
            present_count,
            absent_count: absentees.len() as u32,
            absentees,
        }
    }

    pub fn submit(&mut self) -> AttendanceResult<ConfirmationSummary> {
        self.expect_stage(WizardStage::MarkAttendance, "submit")?;
        self.stage = WizardStage::Confirm;
        Ok(self.summary())
    }

    /// Leaves Confirm with every toggle preserved.
    pub fn cancel_confirm(&mut self) -> AttendanceResult<()> {
        self.expect_stage(WizardStage::Confirm, "cancel confirmation")?;
        self.stage = WizardStage::MarkAttendance;
        Ok(())
    }

    /// Captures the batch-filtered entries for a commit. Fails without any
    /// state change when nothing would be recorded.
    pub fn prepare_commit(&self) -> AttendanceResult<PendingCommit> {
        self.expect_stage(WizardStage::Confirm, "commit")?;
        let subject = self
            .subject
            .as_ref()
            .ok_or_else(|| AttendanceError::validation("no subject selected"))?;
        let session_time = self
            .session_time
            .clone()
            .ok_or_else(|| AttendanceError::validation("no session time selected"))?;

        let entries: Vec<AttendanceEntry> = self
            .visible_marks()
            .map(|mark| AttendanceEntry::new(&mark.student_id, &mark.display_name, mark.present))
            .collect();
        if entries.is_empty() {
            return Err(AttendanceError::validation(
                "no students match the selected batch",
            ));
        }

        Ok(PendingCommit {
            subject_code: subject.code.clone(),
            session_time,
            batch: BatchScope::from_selection(self.batch),
            entries,
        })
    }

    pub fn mark_recorded(&mut self, outcome: CommitOutcome) {
        self.stage = WizardStage::Recorded;
        self.outcome = Some(outcome);
        self.failure = None;
    }

    pub fn mark_failed(&mut self, message: String) {
        self.stage = WizardStage::Failed;
        self.outcome = None;
        self.failure = Some(message);
    }

    /// Back to a fresh SelectParameters; only the subject catalogue survives.
    pub fn reset(&mut self) -> AttendanceResult<()> {
        if !self.stage.is_terminal() {
            return Err(AttendanceError::InvalidTransition {
                action: "reset",
                stage: self.stage.as_str(),
            });
        }
        let subjects = std::mem::take(&mut self.subjects);
        *self = Self {
            subjects,
            ..Self::default()
        };
        Ok(())
    }
}
