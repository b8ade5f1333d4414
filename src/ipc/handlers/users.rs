use serde_json::json;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{
    call_api, opt_bool, opt_str, require_admin, require_bool, require_i64, require_str,
};
use crate::ipc::types::{AppState, Request};
use crate::roster;

fn handle_view(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let list = call_api(state, |api| api.list_users())?;
    state.users = Some(list.users);
    Ok(json!({ "users": &state.users }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let username = require_str(req, "username")?.to_string();
    let password = require_str(req, "password")?.to_string();
    let is_admin = require_bool(req, "isAdmin")?;
    let created = call_api(state, |api| api.create_user(&username, &password, is_admin))?;
    if let Some(users) = state.users.take() {
        state.users = Some(roster::insert(&users, created.user.clone()));
    }
    Ok(json!({ "user": created.user, "users": &state.users }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let user_id = require_i64(req, "userId")?;
    let mut fields = serde_json::Map::new();
    if let Some(username) = opt_str(req, "username") {
        fields.insert("username".to_string(), json!(username));
    }
    if let Some(password) = opt_str(req, "password") {
        fields.insert("password".to_string(), json!(password));
    }
    if let Some(is_admin) = opt_bool(req, "isAdmin") {
        fields.insert("is_admin".to_string(), json!(is_admin));
    }
    if fields.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let fields = serde_json::Value::Object(fields);
    let updated = call_api(state, |api| api.update_user(user_id, &fields))?;
    if let Some(users) = state.users.take() {
        state.users = Some(roster::replace(&users, user_id, updated.user.clone()));
    }
    // editing one's own account refreshes the session copy too
    if let Some(session) = state.session.as_mut() {
        if session.user.id == user_id {
            session.user = updated.user.clone();
        }
    }
    Ok(json!({ "user": updated.user, "users": &state.users }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let user_id = require_i64(req, "userId")?;
    call_api(state, |api| api.delete_user(user_id))?;
    if let Some(users) = state.users.take() {
        state.users = Some(roster::remove(&users, user_id));
    }
    Ok(json!({ "users": &state.users }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "users.view" => handle_view(state, req),
        "users.create" => handle_create(state, req),
        "users.update" => handle_update(state, req),
        "users.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
