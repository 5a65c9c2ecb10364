use crate::calc;
use crate::config;
use crate::db::SqliteStore;
use crate::ipc::error::{err, ok};
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{MarkFilter, MarkRow, Student, StudentFilter, SubjectFilter};
use crate::store::{RecordStore, StoreError};
use rusqlite::Connection;
use serde_json::{json, Value};

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Roster and marks restricted to a class and/or section; `None` widens.
fn load_cohort(
    store: &SqliteStore<'_>,
    class_label: Option<&str>,
    section: Option<&str>,
) -> Result<(Vec<Student>, Vec<MarkRow>), StoreError> {
    let roster = store.students(StudentFilter::cohort(class_label, section))?;
    let marks = store.marks(MarkFilter::cohort(class_label, section))?;
    Ok((roster, marks))
}

fn existing_student(store: &SqliteStore<'_>, req: &Request) -> Result<Student, Value> {
    let student_id = params::required_str(req, "studentId")?;
    match store.student(student_id) {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(err(&req.id, "not_found", "student not found", None)),
        Err(e) => Err(params::query_error(&req.id, e)),
    }
}

fn handle_student_summary(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let student = existing_student(&store, req)?;
    let marks = store
        .marks(MarkFilter::for_student(&student.id))
        .map_err(|e| params::query_error(&req.id, e))?;
    let mut summary = calc::student_summary(&marks);
    summary.student_name = student.name;
    Ok(json!(summary))
}

fn handle_class_analytics(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let class_label = params::required_str(req, "classLabel")?.trim();
    if class_label.is_empty() {
        return Err(err(&req.id, "bad_params", "classLabel must not be empty", None));
    }
    let section = params::optional_str(req, "section");
    let (roster, marks) = load_cohort(&store, Some(class_label), section)
        .map_err(|e| params::query_error(&req.id, e))?;
    Ok(json!(calc::class_analytics(class_label, section, &roster, &marks)))
}

fn handle_subject_comparison(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let subjects = store
        .subjects(SubjectFilter::default())
        .map_err(|e| params::query_error(&req.id, e))?;
    let marks = store
        .marks(MarkFilter::default())
        .map_err(|e| params::query_error(&req.id, e))?;
    Ok(json!({ "subjects": calc::subject_comparison(&subjects, &marks) }))
}

fn handle_top_performers(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let settings = config::analytics_settings(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let limit = match req.params.get("limit") {
        None | Some(Value::Null) => settings.top_performers_limit,
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => n as usize,
            _ => return Err(err(&req.id, "bad_params", "limit must be a positive integer", None)),
        },
    };
    let store = SqliteStore::new(conn);
    let (roster, marks) = load_cohort(&store, params::optional_str(req, "classLabel"), None)
        .map_err(|e| params::query_error(&req.id, e))?;
    let totals = calc::student_totals(&roster, &marks);
    Ok(json!({ "performers": calc::top_performers(&totals, limit) }))
}

fn handle_failing_students(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let settings = config::analytics_settings(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let threshold = params::optional_f64(req, "threshold")?.unwrap_or(settings.failing_threshold);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(err(&req.id, "bad_params", "threshold must be in 0..=100", None));
    }
    let store = SqliteStore::new(conn);
    let (roster, marks) =
        load_cohort(&store, None, None).map_err(|e| params::query_error(&req.id, e))?;
    let totals = calc::student_totals(&roster, &marks);
    Ok(json!({
        "threshold": threshold,
        "students": calc::failing_students(&totals, threshold)
    }))
}

fn handle_grade_distribution(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let (roster, marks) = load_cohort(
        &store,
        params::optional_str(req, "classLabel"),
        params::optional_str(req, "section"),
    )
    .map_err(|e| params::query_error(&req.id, e))?;
    Ok(json!(calc::grade_distribution(&roster, &marks)))
}

fn handle_class_wise(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let (roster, marks) =
        load_cohort(&store, None, None).map_err(|e| params::query_error(&req.id, e))?;
    Ok(json!({ "cohorts": calc::class_wise_performance(&roster, &marks) }))
}

fn handle_student_trends(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let student = existing_student(&store, req)?;
    let marks = store
        .marks(MarkFilter::for_student(&student.id))
        .map_err(|e| params::query_error(&req.id, e))?;
    Ok(json!(calc::student_trends(&marks)))
}

fn handle_overview(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let store = SqliteStore::new(db_conn(state, req)?);
    let subjects = store
        .subjects(SubjectFilter::default())
        .map_err(|e| params::query_error(&req.id, e))?;
    let (students, marks) =
        load_cohort(&store, None, None).map_err(|e| params::query_error(&req.id, e))?;
    Ok(json!(calc::overview(&students, &subjects, &marks)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.studentSummary" => handle_student_summary(state, req),
        "reports.classAnalytics" => handle_class_analytics(state, req),
        "reports.subjectComparison" => handle_subject_comparison(state, req),
        "reports.topPerformers" => handle_top_performers(state, req),
        "reports.failingStudents" => handle_failing_students(state, req),
        "reports.gradeDistribution" => handle_grade_distribution(state, req),
        "reports.classWise" => handle_class_wise(state, req),
        "reports.studentTrends" => handle_student_trends(state, req),
        "reports.overview" => handle_overview(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(resp) => resp,
    })
}
