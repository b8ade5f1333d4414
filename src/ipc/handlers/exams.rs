use std::path::Path;

use serde_json::json;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{
    call_api, opt_i64, opt_str, require_admin, require_array, require_i64, require_session,
    require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::lookup;
use crate::model::{Exam, ExamOne};
use crate::roster;
use crate::spool;

fn read_upload(path: &str) -> Result<(String, Vec<u8>), HandlerErr> {
    let bytes = std::fs::read(path)
        .map_err(|e| HandlerErr::new("io_error", format!("failed to read {path}: {e}")))?;
    let filename = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "exam.pdf".to_string());
    Ok((filename, bytes))
}

fn upload_one(
    state: &mut AppState,
    class_level_id: i64,
    skill_domain_id: i64,
    belt_id: i64,
    code: &str,
    path: &str,
    filename: Option<&str>,
) -> Result<ExamOne, HandlerErr> {
    let (default_name, bytes) = read_upload(path)?;
    let filename = filename.map(str::to_string).unwrap_or(default_name);
    let code = code.to_string();
    call_api(state, |api| {
        api.upload_exam(class_level_id, skill_domain_id, belt_id, &code, &filename, bytes)
    })
}

fn remember_exam(state: &mut AppState, class_level_id: i64, exam: &Exam) {
    if let Some(level) = state.level.as_mut() {
        if level.class_level.id == class_level_id {
            level.exams = roster::insert(&level.exams, exam.clone());
        }
    }
}

fn handle_upload(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let class_level_id = require_i64(req, "classLevelId")?;
    let skill_domain_id = require_i64(req, "skillDomainId")?;
    let belt_id = require_i64(req, "beltId")?;
    let code = require_str(req, "code")?.to_string();
    let path = require_str(req, "path")?.to_string();
    let filename = opt_str(req, "filename").map(str::to_string);
    let uploaded = upload_one(
        state,
        class_level_id,
        skill_domain_id,
        belt_id,
        &code,
        &path,
        filename.as_deref(),
    )?;
    remember_exam(state, class_level_id, &uploaded.exam);
    Ok(json!({
        "exam": uploaded.exam,
        "exams": state.level.as_ref().map(|level| &level.exams),
    }))
}

/// Upload a batch of exam documents. Rows are validated and uploaded
/// independently; a bad row is reported in `errors` and never aborts the
/// rest of the batch. Only a lost session stops early.
fn handle_bulk_upload(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let class_level_id = require_i64(req, "classLevelId")?;
    let rows = require_array(req, "files")?.to_vec();

    let mut uploaded = 0usize;
    let mut errors: Vec<serde_json::Value> = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let skill_domain_id = row.get("skillDomainId").and_then(|v| v.as_i64());
        let belt_id = row.get("beltId").and_then(|v| v.as_i64());
        let code = row.get("code").and_then(|v| v.as_str());
        let path = row.get("path").and_then(|v| v.as_str());
        let (Some(skill_domain_id), Some(belt_id), Some(code), Some(path)) =
            (skill_domain_id, belt_id, code, path)
        else {
            errors.push(json!({
                "index": index,
                "code": "bad_params",
                "message": "missing skillDomainId/beltId/code/path",
            }));
            continue;
        };
        let filename = row.get("filename").and_then(|v| v.as_str());
        match upload_one(
            state,
            class_level_id,
            skill_domain_id,
            belt_id,
            code,
            path,
            filename,
        ) {
            Ok(one) => {
                remember_exam(state, class_level_id, &one.exam);
                uploaded += 1;
            }
            Err(e) if e.code == "session_expired" || e.code == "not_connected" => return Err(e),
            Err(e) => {
                errors.push(json!({
                    "index": index,
                    "code": e.code,
                    "message": e.message,
                }));
            }
        }
    }

    Ok(json!({
        "uploaded": uploaded,
        "rejected": errors.len(),
        "errors": errors,
        "exams": state.level.as_ref().map(|level| &level.exams),
    }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let exam_id = require_i64(req, "examId")?;
    let mut fields = serde_json::Map::new();
    if let Some(code) = opt_str(req, "code") {
        fields.insert("code".to_string(), json!(code));
    }
    if let Some(filename) = opt_str(req, "filename") {
        fields.insert("filename".to_string(), json!(filename));
    }
    if let Some(skill_domain_id) = opt_i64(req, "skillDomainId") {
        fields.insert("skill_domain_id".to_string(), json!(skill_domain_id));
    }
    if let Some(belt_id) = opt_i64(req, "beltId") {
        fields.insert("belt_id".to_string(), json!(belt_id));
    }
    if fields.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let fields = serde_json::Value::Object(fields);
    let updated = call_api(state, |api| api.update_exam(exam_id, &fields))?;
    if let Some(level) = state.level.as_mut() {
        level.exams = roster::replace(&level.exams, exam_id, updated.exam.clone());
    }
    Ok(json!({
        "exam": updated.exam,
        "exams": state.level.as_ref().map(|level| &level.exams),
    }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let exam_id = require_i64(req, "examId")?;
    call_api(state, |api| api.delete_exam(exam_id))?;
    if let Some(level) = state.level.as_mut() {
        level.exams = roster::remove(&level.exams, exam_id);
    }
    Ok(json!({
        "exams": state.level.as_ref().map(|level| &level.exams),
    }))
}

/// Download one exam document and spool it for the shell, keeping the
/// original filename when the exam is part of the loaded level view.
fn handle_download(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let exam_id = require_i64(req, "examId")?;
    let filename = state
        .level
        .as_ref()
        .and_then(|level| {
            let exams = lookup::by_id(&level.exams);
            lookup::resolve(&exams, exam_id, "exam").map(|exam| exam.filename.clone())
        })
        .unwrap_or_else(|| format!("exam-{exam_id}.pdf"));
    let bytes = call_api(state, |api| api.exam_document(exam_id))?;
    let summary = spool::spool_document(&filename, &bytes)
        .map_err(|e| HandlerErr::new("io_error", e.to_string()))?;
    Ok(json!({
        "filename": filename,
        "path": summary.path.to_string_lossy(),
        "bytes": summary.bytes,
        "sha256": summary.sha256,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "exams.upload" => handle_upload(state, req),
        "exams.bulkUpload" => handle_bulk_upload(state, req),
        "exams.update" => handle_update(state, req),
        "exams.delete" => handle_delete(state, req),
        "exams.download" => handle_download(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
