use crate::model::{
    AssessmentType, MarkFilter, MarkRow, Student, StudentFilter, Subject, SubjectFilter,
};
use crate::store::{EntityKind, NewRecord, RecordPatch, RecordQuery, RecordStore, Rows, StoreError};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;
    info!(path = %db_path.display(), "opened workspace database");
    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            class_label TEXT NOT NULL,
            section TEXT NOT NULL,
            date_of_birth TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_section ON students(class_label, section)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT
        )",
        [],
    )?;

    // No ON DELETE CASCADE: dependent marks are deleted explicitly, in order.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            marks_obtained REAL NOT NULL CHECK(marks_obtained >= 0),
            max_marks REAL NOT NULL DEFAULT 100 CHECK(max_marks > 0),
            assessment_date TEXT NOT NULL,
            assessment_type TEXT NOT NULL DEFAULT 'Assignment',
            created_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            CHECK(marks_obtained <= max_marks)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_student ON marks(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_subject ON marks(subject_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_assessment_date ON marks(assessment_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Distinct, sorted values of a student label column (`class_label` or
/// `section`).
pub fn student_labels(conn: &Connection, column: StudentLabel) -> anyhow::Result<Vec<String>> {
    let col = match column {
        StudentLabel::Class => "class_label",
        StudentLabel::Section => "section",
    };
    let sql = format!("SELECT DISTINCT {col} FROM students ORDER BY {col}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentLabel {
    Class,
    Section,
}

impl ToSql for AssessmentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AssessmentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        AssessmentType::parse(s).ok_or_else(|| {
            FromSqlError::Other(format!("unknown assessment type: {}", s).into())
        })
    }
}

/// [`RecordStore`] over a workspace SQLite connection.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_students(&self, f: &StudentFilter) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, class_label, section, date_of_birth
             FROM students
             WHERE (?1 IS NULL OR id = ?1)
               AND (?2 IS NULL OR class_label = ?2)
               AND (?3 IS NULL OR section = ?3)
               AND (?4 IS NULL OR name LIKE '%' || ?4 || '%')
             ORDER BY class_label, section, name, rowid",
        )?;
        let rows = stmt
            .query_map(
                params![f.id, f.class_label, f.section, f.search],
                |r| {
                    Ok(Student {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        class_label: r.get(2)?,
                        section: r.get(3)?,
                        date_of_birth: r.get(4)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_subjects(&self, f: &SubjectFilter) -> Result<Vec<Subject>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name
             FROM subjects
             WHERE (?1 IS NULL OR id = ?1)
               AND (?2 IS NULL OR name = ?2)
               AND (?3 IS NULL OR name LIKE '%' || ?3 || '%')
             ORDER BY name, rowid",
        )?;
        let rows = stmt
            .query_map(params![f.id, f.name, f.search], |r| {
                Ok(Subject {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_marks(&self, f: &MarkFilter) -> Result<Vec<MarkRow>, StoreError> {
        // Owner-specific ordering: a report card lists by subject, a subject
        // sheet by student, everything else newest first.
        let order_by = if f.student_id.is_some() {
            "sub.name, m.assessment_date DESC, m.rowid"
        } else if f.subject_id.is_some() {
            "s.name, m.assessment_date DESC, m.rowid"
        } else {
            "m.assessment_date DESC, s.name, sub.name, m.rowid"
        };
        let sql = format!(
            "SELECT m.id, m.student_id, s.name, m.subject_id, sub.name,
                    m.marks_obtained, m.max_marks, m.assessment_date, m.assessment_type
             FROM marks m
             JOIN students s ON s.id = m.student_id
             JOIN subjects sub ON sub.id = m.subject_id
             WHERE (?1 IS NULL OR m.id = ?1)
               AND (?2 IS NULL OR m.student_id = ?2)
               AND (?3 IS NULL OR m.subject_id = ?3)
               AND (?4 IS NULL OR s.class_label = ?4)
               AND (?5 IS NULL OR s.section = ?5)
             ORDER BY {}",
            order_by
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![f.id, f.student_id, f.subject_id, f.class_label, f.section],
                |r| {
                    Ok(MarkRow {
                        mark_id: r.get(0)?,
                        student_id: r.get(1)?,
                        student_name: r.get(2)?,
                        subject_id: r.get(3)?,
                        subject_name: r.get(4)?,
                        marks_obtained: r.get(5)?,
                        max_marks: r.get(6)?,
                        assessment_date: r.get(7)?,
                        assessment_type: r.get(8)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_with_marks(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let (marks_sql, parent_sql) = match kind {
            EntityKind::Student => (
                Some("DELETE FROM marks WHERE student_id = ?"),
                "DELETE FROM students WHERE id = ?",
            ),
            EntityKind::Subject => (
                Some("DELETE FROM marks WHERE subject_id = ?"),
                "DELETE FROM subjects WHERE id = ?",
            ),
            EntityKind::Mark => (None, "DELETE FROM marks WHERE id = ?"),
        };

        // Marks go first so the parent never leaves orphans behind; the
        // transaction keeps the pair all-or-nothing.
        let tx = self.conn.unchecked_transaction()?;
        let cascaded = match marks_sql {
            Some(sql) => tx.execute(sql, [id])?,
            None => 0,
        };
        let deleted = tx.execute(parent_sql, [id])?;
        if deleted == 0 {
            tx.rollback()?;
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        tx.commit()?;
        debug!(%kind, id, cascaded, "deleted record");
        Ok(())
    }
}

impl RecordStore for SqliteStore<'_> {
    fn insert(&self, record: NewRecord) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        match &record {
            NewRecord::Student(f) => {
                self.conn.execute(
                    "INSERT INTO students(id, name, class_label, section, date_of_birth, created_at)
                     VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                    params![id, f.name, f.class_label, f.section, f.date_of_birth],
                )?;
            }
            NewRecord::Subject(f) => {
                self.conn.execute(
                    "INSERT INTO subjects(id, name, created_at)
                     VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                    params![id, f.name],
                )?;
            }
            NewRecord::Mark(f) => {
                self.conn.execute(
                    "INSERT INTO marks(
                       id,
                       student_id,
                       subject_id,
                       marks_obtained,
                       max_marks,
                       assessment_date,
                       assessment_type,
                       created_at
                     ) VALUES(?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                    params![
                        id,
                        f.student_id,
                        f.subject_id,
                        f.marks_obtained,
                        f.max_marks,
                        f.assessment_date,
                        f.assessment_type
                    ],
                )?;
            }
        }
        debug!(kind = %record.kind(), %id, "inserted record");
        Ok(id)
    }

    fn update(&self, id: &str, patch: RecordPatch) -> Result<(), StoreError> {
        let kind = patch.kind();
        let changed = match &patch {
            RecordPatch::Student(f) => self.conn.execute(
                "UPDATE students
                 SET name = ?, class_label = ?, section = ?, date_of_birth = ?
                 WHERE id = ?",
                params![f.name, f.class_label, f.section, f.date_of_birth, id],
            )?,
            RecordPatch::Subject(f) => self.conn.execute(
                "UPDATE subjects SET name = ? WHERE id = ?",
                params![f.name, id],
            )?,
            RecordPatch::Mark(f) => self.conn.execute(
                "UPDATE marks
                 SET marks_obtained = ?, max_marks = ?, assessment_date = ?, assessment_type = ?
                 WHERE id = ?",
                params![
                    f.marks_obtained,
                    f.max_marks,
                    f.assessment_date,
                    f.assessment_type,
                    id
                ],
            )?,
        };
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        self.delete_with_marks(kind, id)
    }

    fn query(&self, query: RecordQuery) -> Result<Rows, StoreError> {
        match &query {
            RecordQuery::Students(f) => Ok(Rows::Students(self.query_students(f)?)),
            RecordQuery::Subjects(f) => Ok(Rows::Subjects(self.query_subjects(f)?)),
            RecordQuery::Marks(f) => Ok(Rows::Marks(self.query_marks(f)?)),
        }
    }
}
