use serde_json::json;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{
    call_api, opt_bool, opt_i64, opt_str, require_admin, require_bool, require_i64, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::roster;

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let student_id = require_i64(req, "studentId")?;
    let skill_domain_id = require_i64(req, "skillDomainId")?;
    let belt_id = require_i64(req, "beltId")?;
    let date = require_str(req, "date")?.to_string();
    let success = require_bool(req, "success")?;
    let created = call_api(state, |api| {
        api.create_evaluation(student_id, skill_domain_id, belt_id, &date, success)
    })?;
    if let Some(view) = state.student.as_mut() {
        if view.student.id == student_id {
            view.evaluations = roster::insert(&view.evaluations, created.evaluation.clone());
        }
    }
    Ok(json!({
        "evaluation": created.evaluation,
        "evaluations": state.student.as_ref().map(|view| &view.evaluations),
    }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let evaluation_id = require_i64(req, "evaluationId")?;
    let mut fields = serde_json::Map::new();
    if let Some(skill_domain_id) = opt_i64(req, "skillDomainId") {
        fields.insert("skill_domain_id".to_string(), json!(skill_domain_id));
    }
    if let Some(belt_id) = opt_i64(req, "beltId") {
        fields.insert("belt_id".to_string(), json!(belt_id));
    }
    if let Some(date) = opt_str(req, "date") {
        fields.insert("date".to_string(), json!(date));
    }
    if let Some(success) = opt_bool(req, "success") {
        fields.insert("success".to_string(), json!(success));
    }
    if fields.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let fields = serde_json::Value::Object(fields);
    let updated = call_api(state, |api| api.update_evaluation(evaluation_id, &fields))?;
    if let Some(view) = state.student.as_mut() {
        view.evaluations = roster::replace(
            &view.evaluations,
            evaluation_id,
            updated.evaluation.clone(),
        );
    }
    Ok(json!({
        "evaluation": updated.evaluation,
        "evaluations": state.student.as_ref().map(|view| &view.evaluations),
    }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let evaluation_id = require_i64(req, "evaluationId")?;
    call_api(state, |api| api.delete_evaluation(evaluation_id))?;
    if let Some(view) = state.student.as_mut() {
        view.evaluations = roster::remove(&view.evaluations, evaluation_id);
    }
    Ok(json!({
        "evaluations": state.student.as_ref().map(|view| &view.evaluations),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "evaluations.create" => handle_create(state, req),
        "evaluations.update" => handle_update(state, req),
        "evaluations.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
