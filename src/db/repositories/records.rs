use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::warn;
use rusqlite::{params, OptionalExtension};

use crate::{
    db::{
        connection::Database,
        helpers::{format_instant, parse_datetime},
    },
    models::{SessionDocument, SessionRecord},
    store::RecordStore,
};

struct StoredRow {
    session_key: String,
    document: String,
}

/// Decodes stored rows, dropping documents that no longer match the schema.
fn decode_rows(subject_code: &str, rows: Vec<StoredRow>) -> Vec<SessionRecord> {
    rows.into_iter()
        .filter_map(|row| match SessionDocument::decode(&row.session_key, &row.document) {
            Ok(document) => {
                for repair in &document.repairs {
                    warn!(
                        "Attendance record {} in {subject_code}: {repair}",
                        row.session_key
                    );
                }
                if document.attendance.is_none() {
                    warn!(
                        "Attendance record {} in {subject_code} has no entries",
                        row.session_key
                    );
                }
                Some(SessionRecord::from_document(
                    subject_code,
                    row.session_key,
                    document,
                ))
            }
            Err(err) => {
                warn!("Skipping attendance record in {subject_code}: {err}");
                None
            }
        })
        .collect()
}

impl Database {
    pub async fn insert_attendance_record(
        &self,
        subject_code: &str,
        session_key: &str,
        record: &SessionRecord,
    ) -> Result<()> {
        let subject_code = subject_code.to_string();
        let session_key = session_key.to_string();
        let captured_at = format_instant(&record.captured_at);
        let document = record
            .to_document()
            .encode()
            .context("failed to encode attendance document")?;

        self.execute(move |conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM attendance_records WHERE subject_code = ?1 AND session_key = ?2",
                    params![subject_code, session_key],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                bail!("session key {session_key} already exists for subject {subject_code}");
            }

            conn.execute(
                "INSERT INTO attendance_records (subject_code, session_key, captured_at, document)
                 VALUES (?1, ?2, ?3, ?4)",
                params![subject_code, session_key, captured_at, document],
            )
            .with_context(|| "failed to insert attendance record")?;
            Ok(())
        })
        .await
    }

    pub async fn list_attendance_records(&self, subject_code: &str) -> Result<Vec<SessionRecord>> {
        let subject = subject_code.to_string();
        let rows = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_key, document
                     FROM attendance_records
                     WHERE subject_code = ?1
                     ORDER BY rowid ASC",
                )?;

                let mut rows = stmt.query(params![subject])?;
                let mut stored = Vec::new();
                while let Some(row) = rows.next()? {
                    stored.push(StoredRow {
                        session_key: row.get(0)?,
                        document: row.get(1)?,
                    });
                }

                Ok(stored)
            })
            .await
            .with_context(|| format!("failed to list attendance records for {subject_code}"))?;

        Ok(decode_rows(subject_code, rows))
    }

    /// Writes a raw document body, bypassing schema checks. Used to import
    /// historical documents as-is.
    pub async fn import_attendance_document(
        &self,
        subject_code: &str,
        session_key: &str,
        captured_at: &str,
        body: &str,
    ) -> Result<()> {
        let subject_code = subject_code.to_string();
        let session_key = session_key.to_string();
        let captured_at = format_instant(&parse_datetime(captured_at, "captured_at")?);
        let body = body.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attendance_records (subject_code, session_key, captured_at, document)
                 VALUES (?1, ?2, ?3, ?4)",
                params![subject_code, session_key, captured_at, body],
            )
            .with_context(|| "failed to import attendance document")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn append(&self, subject_code: &str, key: &str, record: &SessionRecord) -> Result<()> {
        self.insert_attendance_record(subject_code, key, record).await
    }

    async fn list(&self, subject_code: &str) -> Result<Vec<SessionRecord>> {
        self.list_attendance_records(subject_code).await
    }
}
