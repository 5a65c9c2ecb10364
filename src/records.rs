//! Validated writes on top of a [`RecordStore`], plus row-by-row bulk import.

use crate::model::{MarkFields, MarkUpdate, StudentFields, SubjectFields};
use crate::store::{EntityKind, NewRecord, RecordPatch, RecordStore, StoreError};
use crate::validate;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_IMPORT_ROWS: usize = 5000;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WriteError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => WriteError::NotFound { kind, id },
            other => WriteError::Store(other),
        }
    }
}

fn trimmed_student(fields: &StudentFields) -> StudentFields {
    StudentFields {
        name: fields.name.trim().to_string(),
        class_label: fields.class_label.trim().to_string(),
        section: fields.section.trim().to_string(),
        date_of_birth: fields.date_of_birth,
    }
}

pub fn add_student<S: RecordStore + ?Sized>(
    store: &S,
    fields: &StudentFields,
    today: NaiveDate,
) -> Result<String, WriteError> {
    validate::validate_student(fields, today)
        .into_result()
        .map_err(WriteError::Validation)?;
    Ok(store.insert(NewRecord::Student(trimmed_student(fields)))?)
}

pub fn update_student<S: RecordStore + ?Sized>(
    store: &S,
    id: &str,
    fields: &StudentFields,
    today: NaiveDate,
) -> Result<(), WriteError> {
    validate::validate_student(fields, today)
        .into_result()
        .map_err(WriteError::Validation)?;
    Ok(store.update(id, RecordPatch::Student(trimmed_student(fields)))?)
}

/// Removes the student and every mark recorded for them.
pub fn delete_student<S: RecordStore + ?Sized>(store: &S, id: &str) -> Result<(), WriteError> {
    Ok(store.delete(EntityKind::Student, id)?)
}

pub fn add_subject<S: RecordStore + ?Sized>(store: &S, name: &str) -> Result<String, WriteError> {
    validate::validate_subject(store, name, None)?
        .into_result()
        .map_err(WriteError::Validation)?;
    let fields = SubjectFields {
        name: name.trim().to_string(),
    };
    Ok(store.insert(NewRecord::Subject(fields))?)
}

pub fn update_subject<S: RecordStore + ?Sized>(
    store: &S,
    id: &str,
    name: &str,
) -> Result<(), WriteError> {
    validate::validate_subject(store, name, Some(id))?
        .into_result()
        .map_err(WriteError::Validation)?;
    let fields = SubjectFields {
        name: name.trim().to_string(),
    };
    Ok(store.update(id, RecordPatch::Subject(fields))?)
}

/// Removes the subject and every mark recorded against it.
pub fn delete_subject<S: RecordStore + ?Sized>(store: &S, id: &str) -> Result<(), WriteError> {
    Ok(store.delete(EntityKind::Subject, id)?)
}

pub fn add_mark<S: RecordStore + ?Sized>(
    store: &S,
    fields: &MarkFields,
    today: NaiveDate,
) -> Result<String, WriteError> {
    validate::validate_mark(
        fields.marks_obtained,
        fields.max_marks,
        Some(fields.assessment_date),
        today,
    )
    .into_result()
    .map_err(WriteError::Validation)?;

    if store.student(&fields.student_id)?.is_none() {
        return Err(WriteError::NotFound {
            kind: EntityKind::Student,
            id: fields.student_id.clone(),
        });
    }
    if store.subject(&fields.subject_id)?.is_none() {
        return Err(WriteError::NotFound {
            kind: EntityKind::Subject,
            id: fields.subject_id.clone(),
        });
    }
    Ok(store.insert(NewRecord::Mark(fields.clone()))?)
}

pub fn update_mark<S: RecordStore + ?Sized>(
    store: &S,
    id: &str,
    update: &MarkUpdate,
    today: NaiveDate,
) -> Result<(), WriteError> {
    validate::validate_mark(
        update.marks_obtained,
        update.max_marks,
        Some(update.assessment_date),
        today,
    )
    .into_result()
    .map_err(WriteError::Validation)?;
    Ok(store.update(id, RecordPatch::Mark(update.clone()))?)
}

pub fn delete_mark<S: RecordStore + ?Sized>(store: &S, id: &str) -> Result<(), WriteError> {
    Ok(store.delete(EntityKind::Mark, id)?)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 0-based position in the submitted rows.
    pub row: usize,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub success_rate: f64,
    pub created_ids: Vec<String>,
    pub errors: Vec<RowError>,
}

/// A row that either parsed into fields or already failed with messages.
pub type ParsedRow<T> = Result<T, Vec<String>>;

fn import_rows<T, F>(entity: EntityKind, rows: Vec<ParsedRow<T>>, mut write: F) -> ImportReport
where
    F: FnMut(T) -> Result<String, WriteError>,
{
    let total = rows.len();
    let mut created_ids = Vec::new();
    let mut errors = Vec::new();

    for (row, parsed) in rows.into_iter().enumerate() {
        let outcome = match parsed {
            Ok(fields) => write(fields),
            Err(messages) => Err(WriteError::Validation(messages)),
        };
        match outcome {
            Ok(id) => created_ids.push(id),
            Err(WriteError::Validation(messages)) => errors.push(RowError { row, messages }),
            Err(e) => {
                if matches!(e, WriteError::Store(_)) {
                    warn!(%entity, row, error = %e, "import row failed in storage");
                }
                errors.push(RowError {
                    row,
                    messages: vec![e.to_string()],
                });
            }
        }
    }

    let success = created_ids.len();
    let success_rate = if total == 0 {
        0.0
    } else {
        crate::grading::round2(success as f64 / total as f64 * 100.0)
    };
    info!(%entity, total, success, failed = errors.len(), "import finished");

    ImportReport {
        total_count: total,
        success_count: success,
        error_count: errors.len(),
        success_rate,
        created_ids,
        errors,
    }
}

pub fn import_students<S: RecordStore + ?Sized>(
    store: &S,
    rows: Vec<ParsedRow<StudentFields>>,
    today: NaiveDate,
) -> ImportReport {
    import_rows(EntityKind::Student, rows, |f| add_student(store, &f, today))
}

pub fn import_subjects<S: RecordStore + ?Sized>(
    store: &S,
    rows: Vec<ParsedRow<SubjectFields>>,
) -> ImportReport {
    import_rows(EntityKind::Subject, rows, |f| add_subject(store, &f.name))
}

pub fn import_marks<S: RecordStore + ?Sized>(
    store: &S,
    rows: Vec<ParsedRow<MarkFields>>,
    today: NaiveDate,
) -> ImportReport {
    import_rows(EntityKind::Mark, rows, |f| add_mark(store, &f, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, SqliteStore};
    use crate::model::{AssessmentType, MarkFilter, SubjectFilter};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    fn student(name: &str) -> StudentFields {
        StudentFields {
            name: name.into(),
            class_label: "10".into(),
            section: "A".into(),
            date_of_birth: Some(date(2008, 3, 1)),
        }
    }

    fn mark(student_id: &str, subject_id: &str, obtained: f64) -> MarkFields {
        MarkFields {
            student_id: student_id.into(),
            subject_id: subject_id.into(),
            marks_obtained: obtained,
            max_marks: 100.0,
            assessment_date: date(2024, 2, 1),
            assessment_type: AssessmentType::Midterm,
        }
    }

    #[test]
    fn invalid_student_is_not_written() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let res = add_student(&store, &student("J"), today());
        match res {
            Err(WriteError::Validation(msgs)) => {
                assert_eq!(msgs, vec!["Name must be at least 2 characters long"])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(store.students(Default::default()).expect("list").is_empty());
    }

    #[test]
    fn student_fields_are_trimmed() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let id = add_student(&store, &student("  Neha Gupta "), today()).expect("add");
        let s = store.student(&id).expect("get").expect("present");
        assert_eq!(s.name, "Neha Gupta");
    }

    #[test]
    fn update_missing_student_is_not_found() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let res = update_student(&store, "nope", &student("Neha Gupta"), today());
        assert!(matches!(res, Err(WriteError::NotFound { kind: EntityKind::Student, .. })));
    }

    #[test]
    fn subject_names_trimmed_and_unique() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let id = add_subject(&store, " Chemistry ").expect("add");
        let subjects = store.subjects(SubjectFilter::default()).expect("list");
        assert_eq!(subjects[0].name, "Chemistry");

        let dup = add_subject(&store, "Chemistry");
        assert!(matches!(dup, Err(WriteError::Validation(ref m)) if m == &vec!["Subject already exists".to_string()]));

        update_subject(&store, &id, "Chemistry").expect("rename to itself");
        let other = add_subject(&store, "Physics").expect("add");
        let clash = update_subject(&store, &other, "Chemistry");
        assert!(matches!(clash, Err(WriteError::Validation(_))));
    }

    #[test]
    fn mark_requires_existing_owner() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let sub = add_subject(&store, "Mathematics").expect("subject");
        let res = add_mark(&store, &mark("ghost", &sub, 50.0), today());
        assert!(matches!(res, Err(WriteError::NotFound { kind: EntityKind::Student, .. })));

        let s = add_student(&store, &student("Arjun Nair"), today()).expect("student");
        let res = add_mark(&store, &mark(&s, "ghost", 50.0), today());
        assert!(matches!(res, Err(WriteError::NotFound { kind: EntityKind::Subject, .. })));

        add_mark(&store, &mark(&s, &sub, 50.0), today()).expect("mark");
    }

    #[test]
    fn mark_update_validates_then_writes() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let s = add_student(&store, &student("Arjun Nair"), today()).expect("student");
        let sub = add_subject(&store, "Mathematics").expect("subject");
        let id = add_mark(&store, &mark(&s, &sub, 50.0), today()).expect("mark");

        let bad = MarkUpdate {
            marks_obtained: 150.0,
            max_marks: 100.0,
            assessment_date: date(2024, 2, 1),
            assessment_type: AssessmentType::Final,
        };
        assert!(matches!(update_mark(&store, &id, &bad, today()), Err(WriteError::Validation(_))));

        let good = MarkUpdate {
            marks_obtained: 72.5,
            ..bad
        };
        update_mark(&store, &id, &good, today()).expect("update");
        let row = store.mark(&id).expect("get").expect("present");
        assert_eq!(row.marks_obtained, 72.5);
        assert_eq!(row.assessment_type, AssessmentType::Final);

        delete_mark(&store, &id).expect("delete");
        assert!(matches!(delete_mark(&store, &id), Err(WriteError::NotFound { .. })));
    }

    #[test]
    fn import_reports_each_bad_row() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let rows = vec![
            Ok(student("Aarav Sharma")),
            Ok(student("X")),
            Err(vec!["Invalid date of birth format, use YYYY-MM-DD".to_string()]),
            Ok(student("Priya Patel")),
        ];
        let report = import_students(&store, rows, today());
        assert_eq!(report.total_count, 4);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.created_ids.len(), 2);
        let bad_rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(bad_rows, vec![1, 2]);
        assert_eq!(store.students(Default::default()).expect("list").len(), 2);
    }

    #[test]
    fn import_marks_and_subjects() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let report = import_subjects(
            &store,
            vec![
                Ok(SubjectFields { name: "Physics".into() }),
                Ok(SubjectFields { name: "Physics".into() }),
            ],
        );
        assert_eq!(report.success_count, 1);
        assert_eq!(report.errors[0].row, 1);
        assert_eq!(report.errors[0].messages, vec!["Subject already exists"]);

        let sub = report.created_ids[0].clone();
        let s = add_student(&store, &student("Arjun Nair"), today()).expect("student");
        let report = import_marks(
            &store,
            vec![Ok(mark(&s, &sub, 80.0)), Ok(mark("ghost", &sub, 10.0))],
            today(),
        );
        assert_eq!(report.success_count, 1);
        assert_eq!(report.errors[0].messages, vec!["student not found: ghost"]);
        assert_eq!(store.marks(MarkFilter::default()).expect("marks").len(), 1);
    }

    #[test]
    fn empty_import_is_zero_rate() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let report = import_subjects(&store, Vec::new());
        assert_eq!(report.total_count, 0);
        assert_eq!(report.success_rate, 0.0);
    }
}
