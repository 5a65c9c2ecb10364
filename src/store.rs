//! Storage-agnostic record store.
//!
//! The aggregation engine never touches SQL: it receives typed rows from a
//! [`RecordStore`]. Every operation is tagged by [`EntityKind`] so a store
//! can be checked against this contract independently of its backend.

use crate::model::{
    MarkFields, MarkFilter, MarkRow, MarkUpdate, Student, StudentFields, StudentFilter, Subject,
    SubjectFields, SubjectFilter,
};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Subject,
    Mark,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Student => "student",
            EntityKind::Subject => "subject",
            EntityKind::Mark => "mark",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewRecord {
    Student(StudentFields),
    Subject(SubjectFields),
    Mark(MarkFields),
}

impl NewRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewRecord::Student(_) => EntityKind::Student,
            NewRecord::Subject(_) => EntityKind::Subject,
            NewRecord::Mark(_) => EntityKind::Mark,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordPatch {
    Student(StudentFields),
    Subject(SubjectFields),
    Mark(MarkUpdate),
}

impl RecordPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordPatch::Student(_) => EntityKind::Student,
            RecordPatch::Subject(_) => EntityKind::Subject,
            RecordPatch::Mark(_) => EntityKind::Mark,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordQuery {
    Students(StudentFilter),
    Subjects(SubjectFilter),
    Marks(MarkFilter),
}

impl RecordQuery {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordQuery::Students(_) => EntityKind::Student,
            RecordQuery::Subjects(_) => EntityKind::Subject,
            RecordQuery::Marks(_) => EntityKind::Mark,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rows {
    Students(Vec<Student>),
    Subjects(Vec<Subject>),
    Marks(Vec<MarkRow>),
}

impl Rows {
    pub fn kind(&self) -> EntityKind {
        match self {
            Rows::Students(_) => EntityKind::Student,
            Rows::Subjects(_) => EntityKind::Subject,
            Rows::Marks(_) => EntityKind::Mark,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("store answered a {expected} query with {got} rows")]
    KindMismatch { expected: EntityKind, got: EntityKind },

    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Insert, update, delete and query over students, subjects and marks.
///
/// Deleting a student or subject must remove the marks that reference it
/// before the parent row itself.
pub trait RecordStore {
    fn insert(&self, record: NewRecord) -> Result<String, StoreError>;
    fn update(&self, id: &str, patch: RecordPatch) -> Result<(), StoreError>;
    fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StoreError>;
    fn query(&self, query: RecordQuery) -> Result<Rows, StoreError>;

    fn students(&self, filter: StudentFilter) -> Result<Vec<Student>, StoreError> {
        match self.query(RecordQuery::Students(filter))? {
            Rows::Students(v) => Ok(v),
            other => Err(StoreError::KindMismatch {
                expected: EntityKind::Student,
                got: other.kind(),
            }),
        }
    }

    fn subjects(&self, filter: SubjectFilter) -> Result<Vec<Subject>, StoreError> {
        match self.query(RecordQuery::Subjects(filter))? {
            Rows::Subjects(v) => Ok(v),
            other => Err(StoreError::KindMismatch {
                expected: EntityKind::Subject,
                got: other.kind(),
            }),
        }
    }

    fn marks(&self, filter: MarkFilter) -> Result<Vec<MarkRow>, StoreError> {
        match self.query(RecordQuery::Marks(filter))? {
            Rows::Marks(v) => Ok(v),
            other => Err(StoreError::KindMismatch {
                expected: EntityKind::Mark,
                got: other.kind(),
            }),
        }
    }

    fn student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.students(StudentFilter::by_id(id))?.into_iter().next())
    }

    fn subject(&self, id: &str) -> Result<Option<Subject>, StoreError> {
        let filter = SubjectFilter {
            id: Some(id.to_string()),
            ..SubjectFilter::default()
        };
        Ok(self.subjects(filter)?.into_iter().next())
    }

    fn subject_by_name(&self, name: &str) -> Result<Option<Subject>, StoreError> {
        let filter = SubjectFilter {
            name: Some(name.to_string()),
            ..SubjectFilter::default()
        };
        Ok(self.subjects(filter)?.into_iter().next())
    }

    fn mark(&self, id: &str) -> Result<Option<MarkRow>, StoreError> {
        let filter = MarkFilter {
            id: Some(id.to_string()),
            ..MarkFilter::default()
        };
        Ok(self.marks(filter)?.into_iter().next())
    }
}
