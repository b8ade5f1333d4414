use serde_json::json;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{call_api, require_admin, require_i64, require_session, require_str};
use crate::ipc::types::{AppState, LevelView, Request};
use crate::roster;

fn handle_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let list = call_api(state, |api| api.list_class_levels())?;
    state.class_levels = Some(list.class_levels);
    Ok(json!({ "class_levels": &state.class_levels }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let prefix = require_str(req, "prefix")?.to_string();
    let created = call_api(state, |api| api.create_class_level(&prefix))?;
    if let Some(class_levels) = state.class_levels.take() {
        state.class_levels = Some(roster::insert(&class_levels, created.class_level.clone()));
    }
    Ok(json!({ "class_level": created.class_level, "class_levels": &state.class_levels }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let class_level_id = require_i64(req, "classLevelId")?;
    let prefix = require_str(req, "prefix")?.to_string();
    let fields = json!({ "prefix": prefix });
    let updated = call_api(state, |api| api.update_class_level(class_level_id, &fields))?;
    if let Some(class_levels) = state.class_levels.take() {
        state.class_levels = Some(roster::replace(
            &class_levels,
            class_level_id,
            updated.class_level.clone(),
        ));
    }
    if let Some(level) = state.level.as_mut() {
        if level.class_level.id == class_level_id {
            level.class_level = updated.class_level.clone();
        }
    }
    Ok(json!({ "class_level": updated.class_level, "class_levels": &state.class_levels }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let class_level_id = require_i64(req, "classLevelId")?;
    call_api(state, |api| api.delete_class_level(class_level_id))?;
    if let Some(class_levels) = state.class_levels.take() {
        state.class_levels = Some(roster::remove(&class_levels, class_level_id));
    }
    if state
        .level
        .as_ref()
        .is_some_and(|level| level.class_level.id == class_level_id)
    {
        state.level = None;
    }
    Ok(json!({ "class_levels": &state.class_levels }))
}

fn handle_view(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let class_level_id = require_i64(req, "classLevelId")?;
    let detail = call_api(state, |api| api.class_level_detail(class_level_id))?;
    let level = LevelView {
        class_level: detail.class_level,
        school_classes: detail.school_classes,
        belts: roster::sorted_by_rank(&detail.belts),
        skill_domains: detail.skill_domains,
        exams: detail.exams,
    };
    let result = json!({
        "class_level": &level.class_level,
        "school_classes": &level.school_classes,
        "belts": &level.belts,
        "skill_domains": &level.skill_domains,
        "exams": &level.exams,
    });
    state.level = Some(level);
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "classLevels.view" => handle_list(state, req),
        "classLevels.create" => handle_create(state, req),
        "classLevels.update" => handle_update(state, req),
        "classLevels.delete" => handle_delete(state, req),
        "classLevel.view" => handle_view(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
