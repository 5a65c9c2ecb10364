use crate::config::{self, MarkSettings};
use crate::db::SqliteStore;
use crate::ipc::error::{err, ok};
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{AssessmentType, MarkFields, StudentFields, SubjectFields};
use crate::records::{self, ParsedRow, MAX_IMPORT_ROWS};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

fn row_object(row: &Value) -> Result<&Map<String, Value>, Vec<String>> {
    row.as_object()
        .ok_or_else(|| vec!["Row must be an object".to_string()])
}

fn row_text(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn row_date(obj: &Map<String, Value>, key: &str, label: &str) -> Result<Option<NaiveDate>, String> {
    match obj.get(key).and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => params::parse_date(s)
            .map(Some)
            .ok_or_else(|| format!("Invalid {} format, use YYYY-MM-DD", label)),
    }
}

fn student_row(row: &Value) -> ParsedRow<StudentFields> {
    let obj = row_object(row)?;
    let date_of_birth = row_date(obj, "dateOfBirth", "date of birth").map_err(|m| vec![m])?;
    Ok(StudentFields {
        name: row_text(obj, "name"),
        class_label: row_text(obj, "classLabel"),
        section: row_text(obj, "section"),
        date_of_birth,
    })
}

fn subject_row(row: &Value) -> ParsedRow<SubjectFields> {
    let obj = row_object(row)?;
    Ok(SubjectFields {
        name: row_text(obj, "name"),
    })
}

fn mark_row(row: &Value, defaults: &MarkSettings, today: NaiveDate) -> ParsedRow<MarkFields> {
    let obj = row_object(row)?;
    let mut problems = Vec::new();

    let student_id = row_text(obj, "studentId");
    if student_id.trim().is_empty() {
        problems.push("Student ID is required".to_string());
    }
    let subject_id = row_text(obj, "subjectId");
    if subject_id.trim().is_empty() {
        problems.push("Subject ID is required".to_string());
    }
    let marks_obtained = obj.get("marksObtained").and_then(|v| v.as_f64());
    if marks_obtained.is_none() {
        problems.push("Marks obtained must be a number".to_string());
    }
    let max_marks = match obj.get("maxMarks") {
        None | Some(Value::Null) => Some(defaults.default_max_marks),
        Some(v) => v.as_f64(),
    };
    if max_marks.is_none() {
        problems.push("Maximum marks must be a number".to_string());
    }
    let assessment_date = match row_date(obj, "assessmentDate", "assessment date") {
        Ok(d) => d.unwrap_or(today),
        Err(m) => {
            problems.push(m);
            today
        }
    };
    let assessment_type = match obj.get("assessmentType").and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") => defaults.default_assessment_type,
        Some(s) => AssessmentType::parse(s).unwrap_or_else(|| {
            problems.push(format!("Unknown assessment type: {}", s));
            defaults.default_assessment_type
        }),
    };

    match (marks_obtained, max_marks) {
        (Some(marks_obtained), Some(max_marks)) if problems.is_empty() => Ok(MarkFields {
            student_id: student_id.trim().to_string(),
            subject_id: subject_id.trim().to_string(),
            marks_obtained,
            max_marks,
            assessment_date,
            assessment_type,
        }),
        _ => Err(problems),
    }
}

fn import_rows<'a>(req: &'a Request) -> Result<&'a Vec<Value>, Value> {
    let rows = params::required_array(req, "rows")?;
    if rows.len() > MAX_IMPORT_ROWS {
        return Err(err(
            &req.id,
            "bad_params",
            format!("too many rows: {} (max {})", rows.len(), MAX_IMPORT_ROWS),
            Some(json!({ "maxRows": MAX_IMPORT_ROWS })),
        ));
    }
    Ok(rows)
}

fn handle_import_students(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let rows = match import_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let parsed = rows.iter().map(student_row).collect();
    let report = records::import_students(&SqliteStore::new(conn), parsed, params::today());
    ok(&req.id, json!(report))
}

fn handle_import_subjects(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let rows = match import_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let parsed = rows.iter().map(subject_row).collect();
    let report = records::import_subjects(&SqliteStore::new(conn), parsed);
    ok(&req.id, json!(report))
}

fn handle_import_marks(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let rows = match import_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let defaults = match config::mark_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let today = params::today();
    let parsed = rows.iter().map(|r| mark_row(r, &defaults, today)).collect();
    let report = records::import_marks(&SqliteStore::new(conn), parsed, today);
    ok(&req.id, json!(report))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "import.students" => Some(handle_import_students(state, req)),
        "import.subjects" => Some(handle_import_subjects(state, req)),
        "import.marks" => Some(handle_import_marks(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MarkSettings {
        MarkSettings {
            default_max_marks: 100.0,
            default_assessment_type: AssessmentType::Assignment,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    #[test]
    fn mark_row_fills_defaults() {
        let row = json!({ "studentId": "s1", "subjectId": "m1", "marksObtained": 42 });
        let f = mark_row(&row, &defaults(), today()).expect("parsed");
        assert_eq!(f.max_marks, 100.0);
        assert_eq!(f.assessment_date, today());
        assert_eq!(f.assessment_type, AssessmentType::Assignment);
    }

    #[test]
    fn mark_row_collects_parse_problems() {
        let row = json!({ "subjectId": "m1", "marksObtained": "lots", "assessmentType": "Exam" });
        let problems = mark_row(&row, &defaults(), today()).expect_err("rejected");
        assert_eq!(
            problems,
            vec![
                "Student ID is required",
                "Marks obtained must be a number",
                "Unknown assessment type: Exam",
            ]
        );
    }

    #[test]
    fn student_row_rejects_bad_date_and_non_objects() {
        let bad = json!({ "name": "Ravi", "classLabel": 10, "section": "A", "dateOfBirth": "05/20/2008" });
        assert_eq!(
            student_row(&bad).expect_err("bad date"),
            vec!["Invalid date of birth format, use YYYY-MM-DD"]
        );
        assert!(student_row(&json!("Ravi")).is_err());

        let good = json!({ "name": "Ravi", "classLabel": 10, "section": "A" });
        let f = student_row(&good).expect("parsed");
        assert_eq!(f.class_label, "10");
        assert_eq!(f.date_of_birth, None);
    }
}
