//! Session records and their persisted document shape.
//!
//! A `SessionRecord` is the domain view of one committed attendance session.
//! On disk it is a `SessionDocument` addressed by `(subject_code, session_key)`;
//! the document keeps the field vocabulary of historical data so existing
//! records stay readable.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AttendanceError, AttendanceResult};

/// Which students a session covers: the whole class, or one lab batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchScope {
    Theory,
    Batch(u32),
}

impl BatchScope {
    pub fn from_selection(batch: Option<u32>) -> Self {
        match batch {
            Some(number) => BatchScope::Batch(number),
            None => BatchScope::Theory,
        }
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            BatchScope::Theory => None,
            BatchScope::Batch(number) => Some(*number),
        }
    }

    pub fn is_theory(&self) -> bool {
        matches!(self, BatchScope::Theory)
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        BatchScope::Theory
    }
}

impl fmt::Display for BatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchScope::Theory => f.write_str("theory"),
            BatchScope::Batch(number) => write!(f, "{number}"),
        }
    }
}

impl Serialize for BatchScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BatchScope::Theory => serializer.serialize_str("theory"),
            BatchScope::Batch(number) => serializer.serialize_u32(*number),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatch {
    Number(u32),
    Text(String),
}

impl<'de> Deserialize<'de> for BatchScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older documents stored the batch selection as a string ("1").
        match RawBatch::deserialize(deserializer)? {
            RawBatch::Number(number) => Ok(BatchScope::Batch(number)),
            RawBatch::Text(text) => {
                let trimmed = text.trim();
                if trimmed.eq_ignore_ascii_case("theory") {
                    return Ok(BatchScope::Theory);
                }
                trimmed
                    .parse::<u32>()
                    .map(BatchScope::Batch)
                    .map_err(|_| serde::de::Error::custom(format!("invalid batch '{text}'")))
            }
        }
    }
}

/// One student's mark within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceEntry {
    #[serde(rename = "sUSN")]
    pub student_id: String,
    #[serde(rename = "sName", default)]
    pub display_name: String,
    #[serde(rename = "Present", default)]
    pub present: bool,
}

impl AttendanceEntry {
    pub fn new(student_id: impl Into<String>, display_name: impl Into<String>, present: bool) -> Self {
        Self {
            student_id: student_id.into(),
            display_name: display_name.into(),
            present,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub subject_code: String,
    pub session_key: String,
    pub captured_at: DateTime<Utc>,
    pub session_time: String,
    pub batch: BatchScope,
    pub entries: Vec<AttendanceEntry>,
    pub present_count: u32,
    pub absent_count: u32,
    pub recorded_by: String,
}

impl SessionRecord {
    /// Builds a record for persistence. Counts are derived from `entries`, so
    /// `present_count + absent_count == entries.len()` always holds.
    pub fn new(
        subject_code: impl Into<String>,
        session_key: impl Into<String>,
        captured_at: DateTime<Utc>,
        session_time: impl Into<String>,
        batch: BatchScope,
        entries: Vec<AttendanceEntry>,
        recorded_by: impl Into<String>,
    ) -> AttendanceResult<Self> {
        if entries.is_empty() {
            return Err(AttendanceError::validation(
                "a session must include at least one student",
            ));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.student_id.as_str()) {
                return Err(AttendanceError::validation(format!(
                    "student {} appears more than once in the session",
                    entry.student_id
                )));
            }
        }

        let (present_count, absent_count) = count_marks(&entries);

        Ok(Self {
            subject_code: subject_code.into(),
            session_key: session_key.into(),
            captured_at,
            session_time: session_time.into(),
            batch,
            entries,
            present_count,
            absent_count,
            recorded_by: recorded_by.into(),
        })
    }

    /// Rebuilds a record from a stored document. Counts are recomputed from
    /// the entries rather than trusted, and a missing entry list is kept as
    /// an empty one.
    pub fn from_document(
        subject_code: impl Into<String>,
        session_key: impl Into<String>,
        document: SessionDocument,
    ) -> Self {
        let entries = document.attendance.unwrap_or_default();
        let (present_count, absent_count) = count_marks(&entries);

        Self {
            subject_code: subject_code.into(),
            session_key: session_key.into(),
            captured_at: document.date,
            session_time: document.session_time,
            batch: document.batch,
            entries,
            present_count,
            absent_count,
            recorded_by: document.updated_by,
        }
    }

    pub fn to_document(&self) -> SessionDocument {
        SessionDocument {
            date: self.captured_at,
            attendance: Some(self.entries.clone()),
            present_count: Some(self.present_count),
            absent_count: Some(self.absent_count),
            updated_by: self.recorded_by.clone(),
            session_time: self.session_time.clone(),
            batch: self.batch,
            repairs: Vec::new(),
        }
    }

    pub fn entry_for(&self, student_id: &str) -> Option<&AttendanceEntry> {
        self.entries.iter().find(|entry| entry.student_id == student_id)
    }

    pub fn is_present(&self, student_id: &str) -> bool {
        self.entry_for(student_id).is_some_and(|entry| entry.present)
    }
}

fn count_marks(entries: &[AttendanceEntry]) -> (u32, u32) {
    entries.iter().fold((0, 0), |(present, absent), entry| {
        if entry.present {
            (present + 1, absent)
        } else {
            (present, absent + 1)
        }
    })
}

/// Stored body of a session record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDocument {
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<Vec<AttendanceEntry>>,
    #[serde(rename = "presentCount", default, skip_serializing_if = "Option::is_none")]
    pub present_count: Option<u32>,
    #[serde(rename = "absentCount", default, skip_serializing_if = "Option::is_none")]
    pub absent_count: Option<u32>,
    #[serde(rename = "updatedBy", default)]
    pub updated_by: String,
    #[serde(rename = "sessionTime", default)]
    pub session_time: String,
    #[serde(rename = "Batch", default)]
    pub batch: BatchScope,
    /// Entry-level problems repaired by `decode`, one message each.
    #[serde(skip)]
    pub repairs: Vec<String>,
}

/// What `decode` accepts before entries and counts are checked one by one.
#[derive(Deserialize)]
struct StoredBody {
    date: DateTime<Utc>,
    #[serde(default)]
    attendance: Option<Vec<Value>>,
    #[serde(rename = "presentCount", default)]
    present_count: Option<Value>,
    #[serde(rename = "absentCount", default)]
    absent_count: Option<Value>,
    #[serde(rename = "updatedBy", default)]
    updated_by: Option<String>,
    #[serde(rename = "sessionTime", default)]
    session_time: Option<String>,
    #[serde(rename = "Batch", default)]
    batch: Option<BatchScope>,
}

fn stored_count(value: Option<Value>) -> Option<u32> {
    value
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|count| u32::try_from(count).ok())
}

/// Entries without a usable `sUSN` are dropped; a `Present` that is not a
/// boolean reads as absent.
fn stored_entry(
    index: usize,
    value: Value,
    repairs: &mut Vec<String>,
) -> Option<AttendanceEntry> {
    let Value::Object(fields) = value else {
        repairs.push(format!("entry {index} is not an object; dropped"));
        return None;
    };

    let student_id = match fields.get("sUSN") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            repairs.push(format!("entry {index} has no usable sUSN; dropped"));
            return None;
        }
    };
    let display_name = fields
        .get("sName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let present = match fields.get("Present") {
        Some(Value::Bool(present)) => *present,
        other => {
            let found = other.map_or_else(|| "missing".to_string(), Value::to_string);
            repairs.push(format!(
                "entry {index} ({student_id}) has Present = {found}; counted absent"
            ));
            false
        }
    };

    Some(AttendanceEntry::new(student_id, display_name, present))
}

impl SessionDocument {
    /// Parses a stored JSON body. A body that is not an object or lacks a
    /// valid `date` is a `DataShape` error; problems inside single entries
    /// are repaired and listed in `repairs` instead.
    pub fn decode(session_key: &str, body: &str) -> AttendanceResult<Self> {
        let stored: StoredBody =
            serde_json::from_str(body).map_err(|err| AttendanceError::DataShape {
                key: session_key.to_string(),
                reason: err.to_string(),
            })?;

        let mut repairs = Vec::new();
        let attendance = stored.attendance.map(|values| {
            values
                .into_iter()
                .enumerate()
                .filter_map(|(index, value)| stored_entry(index, value, &mut repairs))
                .collect()
        });

        Ok(Self {
            date: stored.date,
            attendance,
            present_count: stored_count(stored.present_count),
            absent_count: stored_count(stored.absent_count),
            updated_by: stored.updated_by.unwrap_or_default(),
            session_time: stored.session_time.unwrap_or_default(),
            batch: stored.batch.unwrap_or_default(),
            repairs,
        })
    }

    pub fn encode(&self) -> AttendanceResult<String> {
        serde_json::to_string(self).map_err(|err| AttendanceError::DataShape {
            key: self.date.to_rfc3339(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn counts_follow_entries() {
        let record = SessionRecord::new(
            "21CS41",
            "k1",
            at(9),
            "9:00am - 10:00am",
            BatchScope::Theory,
            vec![
                AttendanceEntry::new("S1", "Asha", true),
                AttendanceEntry::new("S2", "Ravi", false),
                AttendanceEntry::new("S3", "Meera", true),
            ],
            "prof-1",
        )
        .unwrap();

        assert_eq!(record.present_count, 2);
        assert_eq!(record.absent_count, 1);
        assert_eq!(
            (record.present_count + record.absent_count) as usize,
            record.entries.len()
        );
    }

    #[test]
    fn rejects_empty_and_duplicate_entries() {
        let empty = SessionRecord::new("X", "k", at(9), "t", BatchScope::Theory, vec![], "p");
        assert!(matches!(empty, Err(AttendanceError::Validation(_))));

        let dup = SessionRecord::new(
            "X",
            "k",
            at(9),
            "t",
            BatchScope::Theory,
            vec![
                AttendanceEntry::new("S1", "Asha", true),
                AttendanceEntry::new("S1", "Asha", false),
            ],
            "p",
        );
        assert!(matches!(dup, Err(AttendanceError::Validation(_))));
    }

    #[test]
    fn batch_serializes_as_number_or_theory() {
        assert_eq!(serde_json::to_string(&BatchScope::Theory).unwrap(), "\"theory\"");
        assert_eq!(serde_json::to_string(&BatchScope::Batch(2)).unwrap(), "2");

        let legacy: BatchScope = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(legacy, BatchScope::Batch(1));
        let theory: BatchScope = serde_json::from_str("\"theory\"").unwrap();
        assert_eq!(theory, BatchScope::Theory);
        assert!(serde_json::from_str::<BatchScope>("\"lab\"").is_err());
    }

    #[test]
    fn document_uses_stored_field_names() {
        let record = SessionRecord::new(
            "21CSL46",
            "k1",
            at(9),
            "9:00am - 11:00am",
            BatchScope::Batch(1),
            vec![AttendanceEntry::new("S1", "Asha", false)],
            "prof-1",
        )
        .unwrap();

        let value = serde_json::to_value(record.to_document()).unwrap();
        assert_eq!(value["Batch"], 1);
        assert_eq!(value["attendance"][0]["sUSN"], "S1");
        assert_eq!(value["attendance"][0]["sName"], "Asha");
        assert_eq!(value["attendance"][0]["Present"], false);
        assert_eq!(value["presentCount"], 0);
        assert_eq!(value["absentCount"], 1);
        assert_eq!(value["updatedBy"], "prof-1");
        assert_eq!(value["sessionTime"], "9:00am - 11:00am");
    }

    #[test]
    fn decode_tolerates_missing_attendance_but_not_missing_date() {
        let body = r#"{"date":"2026-03-02T09:00:00Z","sessionTime":"x","Batch":"theory"}"#;
        let doc = SessionDocument::decode("k1", body).unwrap();
        let record = SessionRecord::from_document("21CS41", "k1", doc);
        assert!(record.entries.is_empty());
        assert_eq!(record.present_count + record.absent_count, 0);

        let missing_date = SessionDocument::decode("k2", r#"{"attendance":[]}"#);
        assert!(matches!(missing_date, Err(AttendanceError::DataShape { .. })));
    }

    #[test]
    fn stored_counts_are_recomputed() {
        let body = r#"{
            "date":"2026-03-02T09:00:00Z",
            "attendance":[{"sUSN":"S1","sName":"Asha","Present":true}],
            "presentCount":0,"absentCount":0,"updatedBy":"x","sessionTime":"y","Batch":"theory"
        }"#;
        let doc = SessionDocument::decode("k1", body).unwrap();
        let record = SessionRecord::from_document("21CS41", "k1", doc);
        assert_eq!(record.present_count, 1);
        assert_eq!(record.absent_count, 0);
    }

    #[test]
    fn malformed_entries_are_repaired_not_fatal() {
        let body = r#"{
            "date":"2026-03-02T09:00:00Z",
            "attendance":[
                {"sUSN":"S1","sName":"Asha","Present":true},
                {"sUSN":"S2","sName":"Ravi","Present":null},
                {"sName":"Nobody","Present":true},
                "S4",
                {"sUSN":"S5","Present":"yes"}
            ],
            "presentCount":"2","updatedBy":null,"sessionTime":"y"
        }"#;
        let doc = SessionDocument::decode("k1", body).unwrap();
        assert_eq!(doc.repairs.len(), 4);
        assert_eq!(doc.present_count, None);
        assert_eq!(doc.updated_by, "");

        let record = SessionRecord::from_document("21CS41", "k1", doc);
        let ids: Vec<_> = record.entries.iter().map(|e| e.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S5"]);
        assert!(record.is_present("S1"));
        assert!(!record.is_present("S2"));
        assert_eq!(record.present_count, 1);
        assert_eq!(record.absent_count, 2);
    }
}
