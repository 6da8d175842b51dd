use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{from_flag, to_batch, to_flag},
    },
    models::{Student, Subject},
    store::RosterProvider,
};

fn row_to_student(row: &Row) -> Result<Student> {
    let batch: Option<i64> = row.get("batch")?;
    Ok(Student {
        id: row.get("id")?,
        display_name: row.get("display_name")?,
        batch: to_batch(batch, "batch")?,
    })
}

fn row_to_subject(row: &Row) -> Result<Subject> {
    let is_lab: i64 = row.get("is_lab")?;
    Ok(Subject {
        code: row.get("code")?,
        display_name: row.get("display_name")?,
        is_lab: from_flag(is_lab),
    })
}

impl Database {
    /// Insert or replace students; roster order follows the slice order.
    pub async fn upsert_students(&self, students: &[Student]) -> Result<()> {
        let students = students.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for (index, student) in students.iter().enumerate() {
                tx.execute(
                    "INSERT INTO students (id, display_name, batch, sort_order)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                         display_name = excluded.display_name,
                         batch = excluded.batch,
                         sort_order = excluded.sort_order",
                    params![
                        student.id,
                        student.display_name,
                        student.batch.map(i64::from),
                        index as i64,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn list_students(&self) -> Result<Vec<Student>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, display_name, batch
                 FROM students
                 ORDER BY sort_order ASC, id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut students = Vec::new();
            while let Some(row) = rows.next()? {
                students.push(row_to_student(row)?);
            }

            Ok(students)
        })
        .await
    }

    /// Upsert the subjects and make them the catalogue of `user_id`, in order.
    pub async fn assign_subjects(&self, user_id: &str, subjects: &[Subject]) -> Result<()> {
        let user_id = user_id.to_string();
        let subjects = subjects.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM instructor_subjects WHERE user_id = ?1",
                params![user_id],
            )?;
            for (index, subject) in subjects.iter().enumerate() {
                tx.execute(
                    "INSERT INTO subjects (code, display_name, is_lab)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(code) DO UPDATE SET
                         display_name = excluded.display_name,
                         is_lab = excluded.is_lab",
                    params![subject.code, subject.display_name, to_flag(subject.is_lab)],
                )?;
                tx.execute(
                    "INSERT INTO instructor_subjects (user_id, subject_code, sort_order)
                     VALUES (?1, ?2, ?3)",
                    params![user_id, subject.code, index as i64],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn list_subjects_for(&self, user_id: &str) -> Result<Vec<Subject>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.code, s.display_name, s.is_lab
                 FROM instructor_subjects i
                 JOIN subjects s ON s.code = i.subject_code
                 WHERE i.user_id = ?1
                 ORDER BY i.sort_order ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut subjects = Vec::new();
            while let Some(row) = rows.next()? {
                subjects.push(row_to_subject(row)?);
            }

            Ok(subjects)
        })
        .await
    }
}

#[async_trait]
impl RosterProvider for Database {
    async fn get_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        self.list_subjects_for(user_id).await
    }

    async fn get_students(&self) -> Result<Vec<Student>> {
        self.list_students().await
    }
}
