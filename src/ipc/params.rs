//! Request parameter extraction and error-response mapping shared by the
//! handlers. Extractors return the ready-made error response on failure so a
//! handler can bail out with `match ... { Err(resp) => return resp }`.

use crate::ipc::error::err;
use crate::ipc::types::Request;
use crate::records::WriteError;
use crate::store::StoreError;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent, null and blank strings all read as `None`.
pub fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a number", key), None))
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a number", key), None)),
    }
}

pub fn optional_date(req: &Request, key: &str) -> Result<Option<NaiveDate>, Value> {
    match optional_str(req, key) {
        None => Ok(None),
        Some(s) => parse_date(s).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a YYYY-MM-DD date", key),
                None,
            )
        }),
    }
}

pub fn required_array<'a>(req: &'a Request, key: &str) -> Result<&'a Vec<Value>, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be an array", key), None))
}

/// Maps a failed write. `store_code` names the storage step that failed
/// (`db_insert_failed`, `db_update_failed`, `db_delete_failed`).
pub fn write_error(id: &str, store_code: &str, e: WriteError) -> Value {
    match e {
        WriteError::Validation(errors) => err(
            id,
            "validation_failed",
            errors.join(", "),
            Some(json!({ "errors": errors })),
        ),
        WriteError::NotFound { kind, id: missing } => err(
            id,
            "not_found",
            format!("{} not found", kind),
            Some(json!({ "kind": kind.as_str(), "id": missing })),
        ),
        WriteError::Store(e) => {
            warn!(code = store_code, error = %e, "write failed");
            err(id, store_code, e.to_string(), None)
        }
    }
}

pub fn query_error(id: &str, e: StoreError) -> Value {
    warn!(error = %e, "query failed");
    err(id, "db_query_failed", e.to_string(), None)
}
