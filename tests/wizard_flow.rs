use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use rollcall_lib::{
    AttendanceError, AttendanceSettings, BatchScope, Instructor, MemoryStore, RecordStore,
    RosterProvider, SessionRecord, SessionWizard, Student, Subject, WizardStage,
};

fn roster() -> Vec<Student> {
    vec![
        Student::new("S1", "Asha Rao", Some(1)),
        Student::new("S2", "Ravi Kumar", Some(2)),
    ]
}

fn memory_store() -> Arc<MemoryStore> {
    let store = MemoryStore::with_roster(roster());
    store.assign_subjects(
        "prof-1",
        vec![
            Subject::theory("21CS41", "Mathematical Foundations for Computing"),
            Subject::lab("21CSL46", "Python Programming Laboratory"),
        ],
    );
    Arc::new(store)
}

fn wizard(store: Arc<MemoryStore>) -> SessionWizard<MemoryStore, MemoryStore> {
    SessionWizard::new(
        store.clone(),
        store,
        Instructor::new("prof-1", "Prof. Iyer"),
        AttendanceSettings::default(),
    )
}

/// A store whose writes always fail; reads delegate to an inner store.
struct BrokenWrites {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl RecordStore for BrokenWrites {
    async fn append(&self, _: &str, _: &str, _: &SessionRecord) -> Result<()> {
        Err(anyhow!("quota exceeded"))
    }

    async fn list(&self, subject_code: &str) -> Result<Vec<SessionRecord>> {
        self.inner.list(subject_code).await
    }
}

struct BrokenRoster;

#[async_trait]
impl RosterProvider for BrokenRoster {
    async fn get_subjects(&self, _: &str) -> Result<Vec<Subject>> {
        Err(anyhow!("roster service down"))
    }

    async fn get_students(&self) -> Result<Vec<Student>> {
        Err(anyhow!("roster service down"))
    }
}

#[tokio::test]
async fn theory_session_records_everyone_present() {
    rollcall_lib::utils::init_logging();
    let store = memory_store();
    let wizard = wizard(store.clone());

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CS41").await.unwrap();
    wizard.select_session_time("9:00am - 10:00am").await.unwrap();
    let students = wizard.proceed().await.unwrap();
    assert_eq!(students.len(), 2);

    let summary = wizard.submit().await.unwrap();
    assert_eq!(summary.present_count, 2);
    assert_eq!(summary.absent_count, 0);

    let record = wizard.commit().await.unwrap();
    assert_eq!(wizard.stage().await, WizardStage::Recorded);
    assert_eq!(record.entries.len(), 2);
    assert_eq!(record.present_count, 2);
    assert_eq!(record.absent_count, 0);
    assert_eq!(record.batch, BatchScope::Theory);
    assert!(record.batch.is_theory());
    assert_eq!(record.batch.number(), None);
    assert_eq!(record.recorded_by, "prof-1");

    let stored = store.list("21CS41").await.unwrap();
    assert_eq!(stored, vec![record]);
}

#[tokio::test]
async fn lab_session_records_only_the_selected_batch() {
    let store = memory_store();
    let wizard = wizard(store.clone());

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CSL46").await.unwrap();
    wizard.select_session_time("9:00am - 11:00am").await.unwrap();
    wizard.select_batch(Some(1)).await.unwrap();
    wizard.proceed().await.unwrap();

    assert!(!wizard.toggle("S1").await.unwrap());
    let summary = wizard.submit().await.unwrap();
    assert_eq!(summary.absentees.len(), 1);
    assert_eq!(summary.absentees[0].display_name, "Asha Rao");

    let record = wizard.commit().await.unwrap();
    assert_eq!(record.entries.len(), 1);
    assert_eq!(record.entries[0].student_id, "S1");
    assert!(!record.entries[0].present);
    assert_eq!(record.batch, BatchScope::Batch(1));
    assert!(!record.batch.is_theory());
    assert_eq!(record.batch.number(), Some(1));
    assert_eq!(record.present_count + record.absent_count, 1);

    let snapshot = wizard.snapshot().await;
    let outcome = snapshot.outcome.unwrap();
    assert_eq!(outcome.present_count, 0);
    assert_eq!(outcome.absent_count, 1);
}

#[tokio::test]
async fn wizard_exposes_its_catalogues() {
    let wizard = wizard(memory_store());

    assert_eq!(wizard.instructor().id, "prof-1");
    assert_eq!(wizard.batch_options(), &[1, 2, 3]);

    let times = wizard.session_time_options();
    assert_eq!(times.len(), 8);
    assert_eq!(times[0].value, "9:00am - 10:00am");
    assert_eq!(times[0].label, "9:00am - 10:00am (Theory)");
    assert_eq!(times[7].label, "2:00pm - 4:00pm (Lab)");
    for option in times {
        wizard.select_session_time(&option.value).await.unwrap();
    }
}

#[tokio::test]
async fn subjects_cannot_be_reloaded_mid_session() {
    let store = memory_store();
    let wizard = wizard(store.clone());

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CS41").await.unwrap();
    wizard.select_session_time("9:00am - 10:00am").await.unwrap();
    wizard.proceed().await.unwrap();

    store.assign_subjects("prof-1", Vec::new());
    let err = wizard.load_subjects().await.unwrap_err();
    assert!(matches!(err, AttendanceError::InvalidTransition { .. }));
    assert_eq!(wizard.stage().await, WizardStage::MarkAttendance);

    wizard.submit().await.unwrap();
    assert!(wizard.load_subjects().await.is_err());
    let record = wizard.commit().await.unwrap();
    assert_eq!(record.subject_code, "21CS41");
    assert_eq!(store.record_count("21CS41"), 1);
}

#[tokio::test]
async fn empty_batch_is_rejected_without_writing() {
    let store = memory_store();
    let wizard = wizard(store.clone());

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CSL46").await.unwrap();
    wizard.select_session_time("2:00pm - 4:00pm").await.unwrap();
    wizard.select_batch(Some(3)).await.unwrap();
    wizard.proceed().await.unwrap();
    wizard.submit().await.unwrap();

    let err = wizard.commit().await.unwrap_err();
    assert!(matches!(err, AttendanceError::Validation(_)));
    assert_eq!(wizard.stage().await, WizardStage::Confirm);
    assert_eq!(store.record_count("21CSL46"), 0);
}

#[tokio::test]
async fn cannot_proceed_without_required_selections() {
    let store = memory_store();
    let wizard = wizard(store);

    wizard.load_subjects().await.unwrap();
    assert!(wizard.proceed().await.unwrap_err().is_validation());

    wizard.select_subject("21CS41").await.unwrap();
    assert!(wizard.proceed().await.is_err());
    assert_eq!(wizard.stage().await, WizardStage::SelectParameters);
}

#[tokio::test]
async fn cancel_returns_to_marking_with_toggles_intact() {
    let store = memory_store();
    let wizard = wizard(store);

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CS41").await.unwrap();
    wizard.select_session_time("10:00am - 11:00am").await.unwrap();
    wizard.proceed().await.unwrap();
    wizard.toggle("S2").await.unwrap();
    wizard.submit().await.unwrap();
    wizard.cancel().await.unwrap();

    assert_eq!(wizard.stage().await, WizardStage::MarkAttendance);
    let students = wizard.visible_students().await;
    assert!(students[0].present);
    assert!(!students[1].present);
}

#[tokio::test]
async fn write_failure_moves_to_failed_and_reset_starts_over() {
    let inner = memory_store();
    let store = Arc::new(BrokenWrites {
        inner: inner.clone(),
    });
    let wizard = SessionWizard::new(
        store,
        inner.clone(),
        Instructor::new("prof-1", "Prof. Iyer"),
        AttendanceSettings::default(),
    );

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CS41").await.unwrap();
    wizard.select_session_time("9:00am - 10:00am").await.unwrap();
    wizard.proceed().await.unwrap();
    wizard.submit().await.unwrap();

    let err = wizard.commit().await.unwrap_err();
    assert!(matches!(err, AttendanceError::StoreWrite { .. }));
    assert_eq!(wizard.stage().await, WizardStage::Failed);
    assert!(wizard.snapshot().await.failure.is_some());
    assert_eq!(inner.record_count("21CS41"), 0);

    wizard.reset().await.unwrap();
    let snapshot = wizard.snapshot().await;
    assert_eq!(snapshot.stage, WizardStage::SelectParameters);
    assert!(snapshot.subject.is_none());
    assert!(snapshot.students.is_empty());
}

#[tokio::test]
async fn roster_failures_degrade_to_empty_data() {
    let store = memory_store();
    let wizard = SessionWizard::new(
        store.clone(),
        Arc::new(BrokenRoster),
        Instructor::new("prof-1", "Prof. Iyer"),
        AttendanceSettings::default(),
    );

    let err = wizard.load_subjects().await.unwrap_err();
    assert!(matches!(err, AttendanceError::StoreRead { .. }));
    assert!(wizard.select_subject("21CS41").await.is_err());
}

#[tokio::test]
async fn missing_roster_cannot_produce_a_record() {
    struct SubjectsOnly(Arc<MemoryStore>);

    #[async_trait]
    impl RosterProvider for SubjectsOnly {
        async fn get_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
            self.0.get_subjects(user_id).await
        }

        async fn get_students(&self) -> Result<Vec<Student>> {
            Err(anyhow!("timeout"))
        }
    }

    let store = memory_store();
    let wizard = SessionWizard::new(
        store.clone(),
        Arc::new(SubjectsOnly(store.clone())),
        Instructor::new("prof-1", "Prof. Iyer"),
        AttendanceSettings::default(),
    );

    wizard.load_subjects().await.unwrap();
    wizard.select_subject("21CS41").await.unwrap();
    wizard.select_session_time("9:00am - 10:00am").await.unwrap();
    assert!(wizard.proceed().await.unwrap().is_empty());
    wizard.submit().await.unwrap();

    assert!(wizard.commit().await.unwrap_err().is_validation());
    assert_eq!(store.record_count("21CS41"), 0);
}

#[tokio::test]
async fn concurrent_wizards_produce_independent_records() {
    let store = memory_store();
    let first = wizard(store.clone());
    let second = wizard(store.clone());

    for wizard in [&first, &second] {
        wizard.load_subjects().await.unwrap();
        wizard.select_subject("21CS41").await.unwrap();
        wizard.select_session_time("9:00am - 10:00am").await.unwrap();
        wizard.proceed().await.unwrap();
    }
    first.toggle("S1").await.unwrap();
    first.submit().await.unwrap();
    second.submit().await.unwrap();

    let (a, b) = tokio::join!(first.commit(), second.commit());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.session_key, b.session_key);
    assert_eq!(a.absent_count, 1);
    assert_eq!(b.absent_count, 0);
    assert_eq!(store.record_count("21CS41"), 2);
}
