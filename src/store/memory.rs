use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{RecordStore, RosterProvider};
use crate::models::{SessionRecord, Student, Subject};

#[derive(Default)]
struct MemoryData {
    records: HashMap<String, Vec<(String, SessionRecord)>>,
    students: Vec<Student>,
    subjects: HashMap<String, Vec<Subject>>,
}

/// In-process record store and roster provider.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(students: Vec<Student>) -> Self {
        let store = Self::default();
        store.set_students(students);
        store
    }

    pub fn set_students(&self, students: Vec<Student>) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.students = students;
    }

    pub fn assign_subjects(&self, user_id: &str, subjects: Vec<Subject>) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.subjects.insert(user_id.to_string(), subjects);
    }

    pub fn record_count(&self, subject_code: &str) -> usize {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.records.get(subject_code).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, subject_code: &str, key: &str, record: &SessionRecord) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let records = guard.records.entry(subject_code.to_string()).or_default();
        if records.iter().any(|(existing, _)| existing == key) {
            bail!("session key {key} already exists for subject {subject_code}");
        }
        records.push((key.to_string(), record.clone()));
        Ok(())
    }

    async fn list(&self, subject_code: &str) -> Result<Vec<SessionRecord>> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .records
            .get(subject_code)
            .map(|records| records.iter().map(|(_, record)| record.clone()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RosterProvider for MemoryStore {
    async fn get_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.subjects.get(user_id).cloned().unwrap_or_default())
    }

    async fn get_students(&self) -> Result<Vec<Student>> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.students.clone())
    }
}
