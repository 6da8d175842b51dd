pub mod report;
pub mod roster;
pub mod session;

pub use report::{
    AggregateRow, AttendanceTotals, Mark, Percentage, SessionColumn, StudentSummary,
    SubjectAttendance, SubjectTable, SubjectTableRow,
};
pub use roster::{Instructor, Student, Subject};
pub use session::{AttendanceEntry, BatchScope, SessionDocument, SessionRecord};
