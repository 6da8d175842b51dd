//! Pure aggregation over session records. Inputs are never mutated and
//! record order never changes a count.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{
    AggregateRow, AttendanceTotals, Mark, Percentage, SessionColumn, SessionRecord,
    StudentSummary, SubjectAttendance, SubjectTable, SubjectTableRow,
};

use super::SubjectRecords;

/// Which records count as "held" for a student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HeldCounting {
    /// Every record in the collection, whether or not it lists the student.
    AllSessions,
    /// Only records whose entries list the student (enrollment-scoped).
    RosteredSessions,
}

impl Default for HeldCounting {
    fn default() -> Self {
        HeldCounting::AllSessions
    }
}

fn to_count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

pub fn classes_held(records: &[SessionRecord]) -> u32 {
    to_count(records.len())
}

pub fn classes_held_for(records: &[SessionRecord], student_id: &str, counting: HeldCounting) -> u32 {
    match counting {
        HeldCounting::AllSessions => classes_held(records),
        HeldCounting::RosteredSessions => to_count(
            records
                .iter()
                .filter(|record| record.entry_for(student_id).is_some())
                .count(),
        ),
    }
}

/// Records where the student is listed and marked present. A record that
/// does not list the student counts as an absence.
pub fn classes_attended(records: &[SessionRecord], student_id: &str) -> u32 {
    to_count(
        records
            .iter()
            .filter(|record| record.is_present(student_id))
            .count(),
    )
}

pub fn percentage(attended: u32, held: u32) -> Percentage {
    Percentage::of(attended, held)
}

pub fn aggregate_student(
    records: &[SessionRecord],
    student_id: &str,
    counting: HeldCounting,
) -> AggregateRow {
    AggregateRow::new(
        student_id,
        classes_held_for(records, student_id, counting),
        classes_attended(records, student_id),
    )
}

/// Faculty view of one subject: a row per student in order of first
/// appearance across `records`, with a mark for every session column.
pub fn subject_table(
    subject_code: &str,
    records: &[SessionRecord],
    counting: HeldCounting,
) -> SubjectTable {
    let sessions = records
        .iter()
        .map(|record| SessionColumn {
            session_key: record.session_key.clone(),
            captured_at: record.captured_at,
            session_time: record.session_time.clone(),
            batch: record.batch,
        })
        .collect();

    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for entry in records.iter().flat_map(|record| record.entries.iter()) {
        if seen.insert(entry.student_id.as_str()) {
            order.push((entry.student_id.as_str(), entry.display_name.as_str()));
        }
    }

    let rows = order
        .into_iter()
        .map(|(student_id, display_name)| SubjectTableRow {
            display_name: display_name.to_string(),
            aggregate: aggregate_student(records, student_id, counting),
            marks: records
                .iter()
                .map(|record| {
                    if record.is_present(student_id) {
                        Mark::Present
                    } else {
                        Mark::Absent
                    }
                })
                .collect(),
        })
        .collect();

    SubjectTable {
        subject_code: subject_code.to_string(),
        sessions,
        rows,
        read_failed: false,
    }
}

/// Cross-subject view for one student. Totals are summed first and divided
/// once; per-subject percentages are never averaged.
pub fn student_summary(
    student_id: &str,
    subjects: &[SubjectRecords],
    counting: HeldCounting,
) -> StudentSummary {
    let rows: Vec<SubjectAttendance> = subjects
        .iter()
        .map(|entry| {
            let held = classes_held_for(&entry.records, student_id, counting);
            let attended = classes_attended(&entry.records, student_id);
            SubjectAttendance {
                subject_code: entry.subject.code.clone(),
                display_name: entry.subject.display_name.clone(),
                is_lab: entry.subject.is_lab,
                classes_held: held,
                classes_attended: attended,
                percentage: percentage(attended, held),
                read_failed: entry.read_failed,
            }
        })
        .collect();

    let totals = |lab: Option<bool>| {
        AttendanceTotals::from_counts(
            rows.iter()
                .filter(|row| lab.map_or(true, |is_lab| row.is_lab == is_lab))
                .map(|row| (row.classes_held, row.classes_attended)),
        )
    };
    let overall = totals(None);
    let theory = totals(Some(false));
    let lab = totals(Some(true));

    StudentSummary {
        student_id: student_id.to_string(),
        subjects: rows,
        overall,
        theory,
        lab,
    }
}
