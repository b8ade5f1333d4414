use serde_json::json;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{
    call_api, opt_str, require_admin, require_i64, require_session, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::roster;

fn handle_view(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let list = call_api(state, |api| api.list_skill_domains())?;
    state.skill_domains = Some(list.skill_domains);
    Ok(json!({ "skill_domains": &state.skill_domains }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let name = require_str(req, "name")?.to_string();
    let code = require_str(req, "code")?.to_string();
    let created = call_api(state, |api| api.create_skill_domain(&name, &code))?;
    if let Some(skill_domains) = state.skill_domains.take() {
        state.skill_domains = Some(roster::insert(
            &skill_domains,
            created.skill_domain.clone(),
        ));
    }
    Ok(json!({
        "skill_domain": created.skill_domain,
        "skill_domains": &state.skill_domains,
    }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let skill_domain_id = require_i64(req, "skillDomainId")?;
    let mut fields = serde_json::Map::new();
    for key in ["name", "code"] {
        if let Some(value) = opt_str(req, key) {
            fields.insert(key.to_string(), json!(value));
        }
    }
    if fields.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let fields = serde_json::Value::Object(fields);
    let updated = call_api(state, |api| api.update_skill_domain(skill_domain_id, &fields))?;
    if let Some(skill_domains) = state.skill_domains.take() {
        state.skill_domains = Some(roster::replace(
            &skill_domains,
            skill_domain_id,
            updated.skill_domain.clone(),
        ));
    }
    Ok(json!({
        "skill_domain": updated.skill_domain,
        "skill_domains": &state.skill_domains,
    }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let skill_domain_id = require_i64(req, "skillDomainId")?;
    call_api(state, |api| api.delete_skill_domain(skill_domain_id))?;
    if let Some(skill_domains) = state.skill_domains.take() {
        state.skill_domains = Some(roster::remove(&skill_domains, skill_domain_id));
    }
    Ok(json!({ "skill_domains": &state.skill_domains }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "skillDomains.view" => handle_view(state, req),
        "skillDomains.create" => handle_create(state, req),
        "skillDomains.update" => handle_update(state, req),
        "skillDomains.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
