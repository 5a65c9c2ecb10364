use crate::config::{self, MarkSettings};
use crate::db::SqliteStore;
use crate::ipc::error::{err, ok};
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{AssessmentType, MarkFields, MarkFilter, MarkRow, MarkUpdate};
use crate::records;
use crate::store::RecordStore;
use serde_json::{json, Value};

fn optional_assessment_type(req: &Request) -> Result<Option<AssessmentType>, Value> {
    match params::optional_str(req, "assessmentType") {
        None => Ok(None),
        Some(s) => AssessmentType::parse(s).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("unknown assessmentType: {}", s),
                None,
            )
        }),
    }
}

/// Builds a new mark from params, filling unset fields from the workspace
/// defaults and today's date.
fn mark_fields(req: &Request, defaults: &MarkSettings) -> Result<MarkFields, Value> {
    Ok(MarkFields {
        student_id: params::required_str(req, "studentId")?.to_string(),
        subject_id: params::required_str(req, "subjectId")?.to_string(),
        marks_obtained: params::required_f64(req, "marksObtained")?,
        max_marks: params::optional_f64(req, "maxMarks")?.unwrap_or(defaults.default_max_marks),
        assessment_date: params::optional_date(req, "assessmentDate")?.unwrap_or_else(params::today),
        assessment_type: optional_assessment_type(req)?.unwrap_or(defaults.default_assessment_type),
    })
}

/// Omitted fields keep their stored values.
fn mark_update(req: &Request, current: &MarkRow) -> Result<MarkUpdate, Value> {
    Ok(MarkUpdate {
        marks_obtained: params::required_f64(req, "marksObtained")?,
        max_marks: params::optional_f64(req, "maxMarks")?.unwrap_or(current.max_marks),
        assessment_date: params::optional_date(req, "assessmentDate")?
            .unwrap_or(current.assessment_date),
        assessment_type: optional_assessment_type(req)?.unwrap_or(current.assessment_type),
    })
}

fn handle_marks_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "marks": [] }));
    };
    let filter = MarkFilter {
        student_id: params::optional_str(req, "studentId").map(str::to_string),
        subject_id: params::optional_str(req, "subjectId").map(str::to_string),
        ..MarkFilter::default()
    };
    match SqliteStore::new(conn).marks(filter) {
        Ok(marks) => ok(&req.id, json!({ "marks": marks })),
        Err(e) => params::query_error(&req.id, e),
    }
}

fn handle_marks_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let defaults = match config::mark_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let fields = match mark_fields(req, &defaults) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::add_mark(&SqliteStore::new(conn), &fields, params::today()) {
        Ok(mark_id) => ok(&req.id, json!({ "markId": mark_id })),
        Err(e) => params::write_error(&req.id, "db_insert_failed", e),
    }
}

fn handle_marks_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mark_id = match params::required_str(req, "markId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn);
    let current = match store.mark(mark_id) {
        Ok(Some(m)) => m,
        Ok(None) => return err(&req.id, "not_found", "mark not found", None),
        Err(e) => return params::query_error(&req.id, e),
    };

    let update = match mark_update(req, &current) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match records::update_mark(&store, mark_id, &update, params::today()) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => params::write_error(&req.id, "db_update_failed", e),
    }
}

fn handle_marks_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mark_id = match params::required_str(req, "markId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::delete_mark(&SqliteStore::new(conn), mark_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => params::write_error(&req.id, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "marks.list" => Some(handle_marks_list(state, req)),
        "marks.create" => Some(handle_marks_create(state, req)),
        "marks.update" => Some(handle_marks_update(state, req)),
        "marks.delete" => Some(handle_marks_delete(state, req)),
        _ => None,
    }
}
