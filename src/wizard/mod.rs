//! Attendance-session wizard: SelectParameters -> MarkAttendance -> Confirm
//! -> Recorded | Failed.

pub mod controller;
pub mod state;

pub use controller::{generate_session_key, SessionWizard, WizardSnapshot};
pub use state::{
    CommitOutcome, ConfirmationSummary, PendingCommit, StudentMark, WizardStage, WizardState,
};
