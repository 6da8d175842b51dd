//! Derived reporting rows. Nothing here is persisted; every value is
//! recomputed from session records on each query.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::models::BatchScope;

/// Attendance percentage rounded to two decimals, or `NotApplicable` when no
/// classes were held. Renders as `N/A`, never as `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Value(f64),
    NotApplicable,
}

impl Percentage {
    pub fn of(attended: u32, held: u32) -> Self {
        if held == 0 {
            return Percentage::NotApplicable;
        }
        let raw = f64::from(attended) / f64::from(held) * 100.0;
        Percentage::Value((raw * 100.0).round() / 100.0)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Percentage::Value(value) => Some(*value),
            Percentage::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Percentage::Value(_))
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percentage::Value(value) => write!(f, "{value:.2}"),
            Percentage::NotApplicable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Percentage::Value(value) => serializer.serialize_f64(*value),
            Percentage::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    pub student_id: String,
    pub classes_held: u32,
    pub classes_attended: u32,
    pub percentage: Percentage,
}

impl AggregateRow {
    pub fn new(student_id: impl Into<String>, classes_held: u32, classes_attended: u32) -> Self {
        Self {
            student_id: student_id.into(),
            classes_held,
            classes_attended,
            percentage: Percentage::of(classes_attended, classes_held),
        }
    }

    pub fn classes_missed(&self) -> u32 {
        self.classes_held.saturating_sub(self.classes_attended)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mark {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "A")]
    Absent,
}

impl Mark {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mark::Present => "P",
            Mark::Absent => "A",
        }
    }
}

/// Column header of the faculty table: one per session in the window.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionColumn {
    pub session_key: String,
    pub captured_at: DateTime<Utc>,
    pub session_time: String,
    pub batch: BatchScope,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTableRow {
    pub display_name: String,
    pub aggregate: AggregateRow,
    /// Aligned with `SubjectTable::sessions`.
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTable {
    pub subject_code: String,
    pub sessions: Vec<SessionColumn>,
    pub rows: Vec<SubjectTableRow>,
    /// Set when the records could not be read; the table is then empty.
    pub read_failed: bool,
}

impl SubjectTable {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    pub subject_code: String,
    pub display_name: String,
    pub is_lab: bool,
    pub classes_held: u32,
    pub classes_attended: u32,
    pub percentage: Percentage,
    pub read_failed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTotals {
    pub classes_held: u32,
    pub classes_attended: u32,
    pub classes_absent: u32,
    pub percentage: Percentage,
}

impl AttendanceTotals {
    /// Sums held and attended independently, then derives one percentage.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let (held, attended) = counts
            .into_iter()
            .fold((0u32, 0u32), |(held, attended), (h, a)| {
                (held.saturating_add(h), attended.saturating_add(a))
            });

        Self {
            classes_held: held,
            classes_attended: attended,
            classes_absent: held.saturating_sub(attended),
            percentage: Percentage::of(attended, held),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    /// In catalogue order.
    pub subjects: Vec<SubjectAttendance>,
    pub overall: AttendanceTotals,
    pub theory: AttendanceTotals,
    pub lab: AttendanceTotals,
}
