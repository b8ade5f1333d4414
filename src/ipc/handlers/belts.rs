use serde_json::json;
use tracing::{error, warn};

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{
    call_api, opt_str, require_admin, require_i64, require_session, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::roster;

fn handle_view(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let list = call_api(state, |api| api.list_belts())?;
    let belts = roster::sorted_by_rank(&list.belts);
    let gaps = roster::rank_gaps(&belts);
    if !gaps.is_empty() {
        error!(?gaps, "inconsistent ranking of belts");
    }
    state.belts = Some(belts);
    Ok(json!({ "belts": &state.belts }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let name = require_str(req, "name")?.to_string();
    let code = require_str(req, "code")?.to_string();
    let color = require_str(req, "color")?.to_string();
    let created = call_api(state, |api| api.create_belt(&name, &code, &color))?;
    if let Some(belts) = state.belts.take() {
        state.belts = Some(roster::insert_ranked(&belts, created.belt.clone()));
    }
    Ok(json!({ "belt": created.belt, "belts": &state.belts }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let belt_id = require_i64(req, "beltId")?;
    let mut fields = serde_json::Map::new();
    for key in ["name", "code", "color"] {
        if let Some(value) = opt_str(req, key) {
            fields.insert(key.to_string(), json!(value));
        }
    }
    if fields.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let fields = serde_json::Value::Object(fields);
    let updated = call_api(state, |api| api.update_belt(belt_id, &fields))?;
    if let Some(belts) = state.belts.take() {
        state.belts = Some(roster::replace(&belts, belt_id, updated.belt.clone()));
    }
    Ok(json!({ "belt": updated.belt, "belts": &state.belts }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let belt_id = require_i64(req, "beltId")?;
    call_api(state, |api| api.delete_belt(belt_id))?;
    if let Some(belts) = state.belts.take() {
        state.belts = Some(roster::remove_ranked(&belts, belt_id));
    }
    Ok(json!({ "belts": &state.belts }))
}

/// Two-step optimistic move: the precondition is checked against local state,
/// the server applies the rank delta, and the local order is re-derived by
/// swapping ranks with the destination occupant. The rank-patch response does
/// not include the reordered collection.
fn handle_move(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let belt_id = require_i64(req, "beltId")?;
    let direction = require_i64(req, "direction")? as i32;
    if direction != 1 && direction != -1 {
        return Err(HandlerErr::new("bad_params", "direction must be 1 or -1"));
    }
    let belts = state
        .belts
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_view", "belts view not loaded"))?;
    let belt = belts
        .iter()
        .find(|belt| belt.id == belt_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("belt {belt_id} not loaded")))?;
    let target = belt.rank + direction;
    if target < 1 || target > belts.len() as i32 {
        return Err(HandlerErr::with_details(
            "move_out_of_bounds",
            format!("cannot move belt {belt_id} to rank {target}"),
            json!({ "rank": belt.rank, "direction": direction }),
        ));
    }
    let snapshot = belts.clone();

    call_api(state, |api| api.patch_belt_rank(belt_id, direction))?;

    match roster::move_swap(&snapshot, belt_id, direction) {
        Ok(next) => {
            state.belts = Some(next);
            Ok(json!({ "belts": &state.belts }))
        }
        Err(e) => {
            // The server already applied the move; re-deriving the order
            // locally failed, so refetch rather than drift.
            warn!(belt_id, %e, "local swap failed after confirmed move, refetching belts");
            let list = call_api(state, |api| api.list_belts())?;
            state.belts = Some(roster::sorted_by_rank(&list.belts));
            Ok(json!({ "belts": &state.belts, "resynced": true }))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "belts.view" => handle_view(state, req),
        "belts.create" => handle_create(state, req),
        "belts.update" => handle_update(state, req),
        "belts.delete" => handle_delete(state, req),
        "belts.move" => handle_move(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
