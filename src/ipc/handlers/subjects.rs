use crate::calc;
use crate::db::SqliteStore;
use crate::ipc::error::{err, ok};
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{MarkFilter, SubjectFilter};
use crate::records;
use crate::store::RecordStore;
use serde_json::{json, Value};

fn handle_subjects_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    let filter = SubjectFilter {
        search: params::optional_str(req, "search").map(str::to_string),
        ..SubjectFilter::default()
    };
    match SqliteStore::new(conn).subjects(filter) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => params::query_error(&req.id, e),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match params::required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::add_subject(&SqliteStore::new(conn), name) {
        Ok(subject_id) => ok(&req.id, json!({ "subjectId": subject_id, "name": name.trim() })),
        Err(e) => params::write_error(&req.id, "db_insert_failed", e),
    }
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match params::required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match params::required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::update_subject(&SqliteStore::new(conn), subject_id, name) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => params::write_error(&req.id, "db_update_failed", e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match params::required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::delete_subject(&SqliteStore::new(conn), subject_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => params::write_error(&req.id, "db_delete_failed", e),
    }
}

fn handle_subjects_stats(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let store = SqliteStore::new(conn);
    let subjects = match store.subjects(SubjectFilter::default()) {
        Ok(v) => v,
        Err(e) => return params::query_error(&req.id, e),
    };
    let marks = match store.marks(MarkFilter::default()) {
        Ok(v) => v,
        Err(e) => return params::query_error(&req.id, e),
    };
    ok(&req.id, json!(calc::subject_stats(&subjects, &marks)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        "subjects.stats" => Some(handle_subjects_stats(state, req)),
        _ => None,
    }
}
