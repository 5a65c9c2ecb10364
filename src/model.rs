use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_MAX_MARKS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssessmentType {
    Quiz,
    #[default]
    Assignment,
    Midterm,
    Final,
    Project,
}

impl AssessmentType {
    pub const ALL: [AssessmentType; 5] = [
        AssessmentType::Quiz,
        AssessmentType::Assignment,
        AssessmentType::Midterm,
        AssessmentType::Final,
        AssessmentType::Project,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentType::Quiz => "Quiz",
            AssessmentType::Assignment => "Assignment",
            AssessmentType::Midterm => "Midterm",
            AssessmentType::Final => "Final",
            AssessmentType::Project => "Project",
        }
    }

    /// Exact, case-sensitive match against the stored labels.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for AssessmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_label: String,
    pub section: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
}

/// A mark joined with the names of its student and subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRow {
    pub mark_id: String,
    pub student_id: String,
    pub student_name: String,
    pub subject_id: String,
    pub subject_name: String,
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub assessment_date: NaiveDate,
    pub assessment_type: AssessmentType,
}

/// Mutable student fields; an update overwrites all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentFields {
    pub name: String,
    pub class_label: String,
    pub section: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectFields {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkFields {
    pub student_id: String,
    pub subject_id: String,
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub assessment_date: NaiveDate,
    pub assessment_type: AssessmentType,
}

/// The part of a mark that may change after creation. The owning student
/// and subject are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkUpdate {
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub assessment_date: NaiveDate,
    pub assessment_type: AssessmentType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFilter {
    pub id: Option<String>,
    pub class_label: Option<String>,
    pub section: Option<String>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
}

impl StudentFilter {
    pub fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn cohort(class_label: Option<&str>, section: Option<&str>) -> Self {
        Self {
            class_label: class_label.map(str::to_string),
            section: section.map(str::to_string),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectFilter {
    pub id: Option<String>,
    /// Exact, case-sensitive name.
    pub name: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkFilter {
    pub id: Option<String>,
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    /// Restrict to marks of students in this class.
    pub class_label: Option<String>,
    pub section: Option<String>,
}

impl MarkFilter {
    pub fn for_student(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_subject(subject_id: &str) -> Self {
        Self {
            subject_id: Some(subject_id.to_string()),
            ..Self::default()
        }
    }

    pub fn cohort(class_label: Option<&str>, section: Option<&str>) -> Self {
        Self {
            class_label: class_label.map(str::to_string),
            section: section.map(str::to_string),
            ..Self::default()
        }
    }
}
