use futures::future::join_all;
use log::warn;

use crate::{
    error::{AttendanceError, AttendanceResult},
    models::{SessionRecord, Subject},
    store::RecordStore,
};

/// Records fetched for one subject of a catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRecords {
    pub subject: Subject,
    pub records: Vec<SessionRecord>,
    /// The read failed and `records` is empty in its place.
    pub read_failed: bool,
}

pub async fn fetch_subject_records<S>(
    store: &S,
    subject_code: &str,
) -> AttendanceResult<Vec<SessionRecord>>
where
    S: RecordStore + ?Sized,
{
    store
        .list(subject_code)
        .await
        .map_err(|err| AttendanceError::store_read(format!("records of {subject_code}"), &err))
}

/// Reads every subject concurrently. Results come back in catalogue order,
/// not arrival order; a failed read degrades to an empty, flagged entry.
pub async fn collect_subject_records<S>(store: &S, subjects: &[Subject]) -> Vec<SubjectRecords>
where
    S: RecordStore + ?Sized,
{
    let reads = subjects
        .iter()
        .map(|subject| fetch_subject_records(store, &subject.code));
    let results = join_all(reads).await;

    subjects
        .iter()
        .zip(results)
        .map(|(subject, result)| match result {
            Ok(records) => SubjectRecords {
                subject: subject.clone(),
                records,
                read_failed: false,
            },
            Err(err) => {
                warn!("Attendance for {} unavailable: {err}", subject.code);
                SubjectRecords {
                    subject: subject.clone(),
                    records: Vec::new(),
                    read_failed: true,
                }
            }
        })
        .collect()
}
