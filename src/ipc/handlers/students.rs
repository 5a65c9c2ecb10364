use crate::db::{self, SqliteStore, StudentLabel};
use crate::ipc::error::{err, ok};
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{StudentFields, StudentFilter};
use crate::records;
use crate::store::RecordStore;
use serde_json::{json, Value};

/// Reads the editable student fields. A missing date of birth is left for
/// validation to report; a malformed one is rejected here.
fn student_fields(req: &Request) -> Result<StudentFields, Value> {
    let text = |k: &str| {
        req.params
            .get(k)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    Ok(StudentFields {
        name: text("name"),
        class_label: text("classLabel"),
        section: text("section"),
        date_of_birth: params::optional_date(req, "dateOfBirth")?,
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let filter = StudentFilter {
        id: None,
        class_label: params::optional_str(req, "classLabel").map(str::to_string),
        section: params::optional_str(req, "section").map(str::to_string),
        search: params::optional_str(req, "search").map(str::to_string),
    };
    match SqliteStore::new(conn).students(filter) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => params::query_error(&req.id, e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match params::required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match SqliteStore::new(conn).student(student_id) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => params::query_error(&req.id, e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let fields = match student_fields(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::add_student(&SqliteStore::new(conn), &fields, params::today()) {
        Ok(student_id) => ok(&req.id, json!({ "studentId": student_id })),
        Err(e) => params::write_error(&req.id, "db_insert_failed", e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match params::required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let fields = match student_fields(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::update_student(&SqliteStore::new(conn), student_id, &fields, params::today()) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => params::write_error(&req.id, "db_update_failed", e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match params::required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::delete_student(&SqliteStore::new(conn), student_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => params::write_error(&req.id, "db_delete_failed", e),
    }
}

fn handle_students_labels(state: &mut AppState, req: &Request, label: StudentLabel) -> Value {
    let key = match label {
        StudentLabel::Class => "classes",
        StudentLabel::Section => "sections",
    };
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ key: [] }));
    };
    match db::student_labels(conn, label) {
        Ok(labels) => ok(&req.id, json!({ key: labels })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.classes" => Some(handle_students_labels(state, req, StudentLabel::Class)),
        "students.sections" => Some(handle_students_labels(state, req, StudentLabel::Section)),
        _ => None,
    }
}
