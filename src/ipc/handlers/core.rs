use serde_json::json;
use tracing::info;

use crate::api::ApiClient;
use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{call_api, require_str};
use crate::ipc::types::{AppState, Request, Session};

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.api.as_ref().map(|api| api.base_url()),
        "authenticated": state.session.is_some(),
    }))
}

fn handle_connect(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let base_url = require_str(req, "baseUrl")?;
    let api = ApiClient::new(base_url)
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid backend: {e}")))?;
    info!(base_url, "connecting to backend");
    // a new backend invalidates everything fetched from the previous one
    *state = AppState::new();
    state.api = Some(api);
    Ok(json!({ "baseUrl": base_url }))
}

fn handle_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let username = require_str(req, "username")?.to_string();
    let password = require_str(req, "password")?.to_string();
    // a 401 here means bad credentials, not an expired session
    let login = call_api(state, |api| api.login(&username, &password)).map_err(|mut e| {
        if e.code == "session_expired" {
            e.code = "api_error";
        }
        e
    })?;
    if let Some(api) = state.api.as_mut() {
        api.set_token(&login.token);
    }
    let result = json!({
        "user": &login.user,
        "student": &login.student,
        "expires": login.payload.exp,
    });
    info!(username = %login.user.username, "logged in");
    state.session = Some(Session {
        user: login.user,
        student: login.student,
    });
    Ok(result)
}

fn handle_logout(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session = None;
    if let Some(api) = state.api.as_mut() {
        api.clear_token();
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "health" => handle_health(state, req),
        "backend.connect" => handle_connect(state, req),
        "auth.login" => handle_login(state, req),
        "auth.logout" => handle_logout(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
