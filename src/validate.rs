//! Input rules checked before any write.
//!
//! Every rule runs and every failure is reported, in a stable order, so the
//! caller can show the whole list at once. Expected bad input never turns
//! into an `Err`; only the store lookup behind the subject duplicate check
//! can fail.

use crate::model::StudentFields;
use crate::store::{RecordStore, StoreError};
use chrono::NaiveDate;
use serde::Serialize;

pub const STUDENT_NAME_MIN: usize = 2;
pub const STUDENT_NAME_MAX: usize = 100;
pub const CLASS_LABEL_MAX: usize = 10;
pub const SECTION_MAX: usize = 5;
pub const SUBJECT_NAME_MIN: usize = 2;
pub const SUBJECT_NAME_MAX: usize = 50;
pub const MAX_MARKS_LIMIT: f64 = 1000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub errors: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    pub fn into_result(self) -> Result<(), Vec<String>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn earliest_birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn validate_student(fields: &StudentFields, today: NaiveDate) -> Validation {
    let mut v = Validation::default();

    let name_len = fields.name.trim().chars().count();
    if name_len < STUDENT_NAME_MIN {
        v.push("Name must be at least 2 characters long");
    } else if name_len > STUDENT_NAME_MAX {
        v.push("Name cannot exceed 100 characters");
    }

    if fields.class_label.trim().is_empty() {
        v.push("Class is required");
    } else if fields.class_label.chars().count() > CLASS_LABEL_MAX {
        v.push("Class name cannot exceed 10 characters");
    }

    if fields.section.trim().is_empty() {
        v.push("Section is required");
    } else if fields.section.chars().count() > SECTION_MAX {
        v.push("Section cannot exceed 5 characters");
    }

    match fields.date_of_birth {
        None => v.push("Date of birth is required"),
        Some(dob) if dob >= today => v.push("Date of birth must be in the past"),
        Some(dob) if dob < earliest_birth_date() => v.push("Invalid date of birth"),
        Some(_) => {}
    }

    v
}

/// Length rules for a subject name; no store access.
pub fn validate_subject_name(name: &str) -> Validation {
    let mut v = Validation::default();
    let len = name.trim().chars().count();
    if len < SUBJECT_NAME_MIN {
        v.push("Subject name must be at least 2 characters long");
    } else if len > SUBJECT_NAME_MAX {
        v.push("Subject name cannot exceed 50 characters");
    }
    v
}

/// Full subject check: length rules plus an exact-match duplicate lookup in
/// the store. `editing` names the subject being renamed so it does not
/// collide with itself.
pub fn validate_subject<S: RecordStore + ?Sized>(
    store: &S,
    name: &str,
    editing: Option<&str>,
) -> Result<Validation, StoreError> {
    let mut v = validate_subject_name(name);
    let trimmed = name.trim();
    if !trimmed.is_empty() {
        if let Some(existing) = store.subject_by_name(trimmed)? {
            if editing != Some(existing.id.as_str()) {
                v.push("Subject already exists");
            }
        }
    }
    Ok(v)
}

pub fn validate_mark(
    marks_obtained: f64,
    max_marks: f64,
    assessment_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Validation {
    let mut v = Validation::default();

    if marks_obtained < 0.0 {
        v.push("Marks obtained cannot be negative");
    } else if marks_obtained > max_marks {
        v.push("Marks obtained cannot exceed maximum marks");
    }

    if max_marks <= 0.0 {
        v.push("Maximum marks must be greater than 0");
    } else if max_marks > MAX_MARKS_LIMIT {
        v.push("Maximum marks seems too high (limit: 1000)");
    }

    if let Some(d) = assessment_date {
        if d > today {
            v.push("Assessment date cannot be in the future");
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, SqliteStore};
    use crate::model::SubjectFields;
    use crate::store::NewRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    fn student(name: &str, class_label: &str, section: &str, dob: Option<NaiveDate>) -> StudentFields {
        StudentFields {
            name: name.into(),
            class_label: class_label.into(),
            section: section.into(),
            date_of_birth: dob,
        }
    }

    #[test]
    fn valid_student_passes() {
        let v = validate_student(&student("John Doe", "10", "A", Some(date(2008, 5, 20))), today());
        assert!(v.is_valid());
        assert!(v.errors.is_empty());
    }

    #[test]
    fn student_errors_are_collected_in_order() {
        let v = validate_student(&student(" J ", "", "ABCDEF", None), today());
        assert!(!v.is_valid());
        assert_eq!(
            v.errors,
            vec![
                "Name must be at least 2 characters long",
                "Class is required",
                "Section cannot exceed 5 characters",
                "Date of birth is required",
            ]
        );
    }

    #[test]
    fn student_birth_date_bounds() {
        let future = validate_student(&student("John Doe", "10", "A", Some(date(2030, 5, 20))), today());
        assert_eq!(future.errors, vec!["Date of birth must be in the past"]);

        let same_day = validate_student(&student("John Doe", "10", "A", Some(today())), today());
        assert_eq!(same_day.errors, vec!["Date of birth must be in the past"]);

        let ancient = validate_student(&student("John Doe", "10", "A", Some(date(1899, 12, 31))), today());
        assert_eq!(ancient.errors, vec!["Invalid date of birth"]);

        let first_allowed = validate_student(&student("John Doe", "10", "A", Some(date(1900, 1, 1))), today());
        assert!(first_allowed.is_valid());
    }

    #[test]
    fn student_long_fields() {
        let long_name = "x".repeat(101);
        let v = validate_student(&student(&long_name, "12345678901", "A", Some(date(2008, 1, 1))), today());
        assert_eq!(
            v.errors,
            vec![
                "Name cannot exceed 100 characters",
                "Class name cannot exceed 10 characters",
            ]
        );
    }

    #[test]
    fn subject_name_lengths() {
        assert!(validate_subject_name("Mathematics").is_valid());
        assert_eq!(
            validate_subject_name("M").errors,
            vec!["Subject name must be at least 2 characters long"]
        );
        assert_eq!(
            validate_subject_name(&"A".repeat(51)).errors,
            vec!["Subject name cannot exceed 50 characters"]
        );
        assert!(validate_subject_name(&"A".repeat(50)).is_valid());
    }

    #[test]
    fn subject_duplicates_are_case_sensitive_and_skip_self() {
        let conn = open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let id = store
            .insert(NewRecord::Subject(SubjectFields { name: "Physics".into() }))
            .expect("insert");

        let dup = validate_subject(&store, "Physics", None).expect("validate");
        assert_eq!(dup.errors, vec!["Subject already exists"]);

        let padded = validate_subject(&store, "  Physics ", None).expect("validate");
        assert_eq!(padded.errors, vec!["Subject already exists"]);

        let other_case = validate_subject(&store, "physics", None).expect("validate");
        assert!(other_case.is_valid());

        let renaming_self = validate_subject(&store, "Physics", Some(&id)).expect("validate");
        assert!(renaming_self.is_valid());
    }

    #[test]
    fn mark_rules() {
        let t = today();
        assert!(validate_mark(85.0, 100.0, Some(t), t).is_valid());

        assert_eq!(
            validate_mark(-1.0, 100.0, None, t).errors,
            vec!["Marks obtained cannot be negative"]
        );
        assert_eq!(
            validate_mark(120.0, 100.0, None, t).errors,
            vec!["Marks obtained cannot exceed maximum marks"]
        );
        assert_eq!(
            validate_mark(0.0, 0.0, None, t).errors,
            vec!["Maximum marks must be greater than 0"]
        );
        assert_eq!(
            validate_mark(10.0, 1001.0, None, t).errors,
            vec!["Maximum marks seems too high (limit: 1000)"]
        );
        assert_eq!(
            validate_mark(10.0, 100.0, Some(date(2024, 6, 2)), t).errors,
            vec!["Assessment date cannot be in the future"]
        );
    }

    #[test]
    fn mark_rules_report_every_failure() {
        let t = today();
        let v = validate_mark(5.0, 0.0, Some(date(2025, 1, 1)), t);
        assert_eq!(
            v.errors,
            vec![
                "Marks obtained cannot exceed maximum marks",
                "Maximum marks must be greater than 0",
                "Assessment date cannot be in the future",
            ]
        );
    }
}
