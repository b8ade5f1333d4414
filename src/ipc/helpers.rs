use crate::api::{ApiClient, ApiError};

use super::error::HandlerErr;
use super::types::{AppState, Request, Session};

pub fn require_i64(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {key}")))
}

pub fn require_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {key}")))
}

pub fn require_bool(req: &Request, key: &str) -> Result<bool, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {key}")))
}

pub fn require_array<'a>(req: &'a Request, key: &str) -> Result<&'a [serde_json::Value], HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {key}")))
}

pub fn opt_i64(req: &Request, key: &str) -> Option<i64> {
    req.params.get(key).and_then(|v| v.as_i64())
}

pub fn opt_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn opt_bool(req: &Request, key: &str) -> Option<bool> {
    req.params.get(key).and_then(|v| v.as_bool())
}

pub fn require_session(state: &AppState) -> Result<&Session, HandlerErr> {
    state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("not_authenticated", "log in first"))
}

/// Mutations are admin-only; the server enforces this too, the engine just
/// refuses earlier with a clearer message.
pub fn require_admin(state: &AppState) -> Result<(), HandlerErr> {
    let session = require_session(state)?;
    if !session.user.is_admin {
        return Err(HandlerErr::new("forbidden", "administrator access required"));
    }
    Ok(())
}

/// Run one REST call against the connected backend and translate failures
/// into envelope errors. A 401 is the single cross-cutting case: it drops the
/// session and surfaces the distinguished `session_expired` code so the shell
/// can force a logged-out state.
pub fn call_api<T>(
    state: &mut AppState,
    f: impl FnOnce(&ApiClient) -> Result<T, ApiError>,
) -> Result<T, HandlerErr> {
    let api = state
        .api
        .as_ref()
        .ok_or_else(|| HandlerErr::new("not_connected", "connect to a backend first"))?;
    let outcome = f(api);
    match outcome {
        Ok(value) => Ok(value),
        Err(ApiError::SessionExpired { message }) => {
            state.session = None;
            if let Some(api) = state.api.as_mut() {
                api.clear_token();
            }
            Err(HandlerErr::new("session_expired", message))
        }
        Err(ApiError::Status { status, message }) => {
            let code = if status == 404 { "not_found" } else { "api_error" };
            Err(HandlerErr::with_details(
                code,
                message,
                serde_json::json!({ "status": status }),
            ))
        }
        Err(e @ ApiError::Transport(_)) => Err(HandlerErr::new("transport_error", e.to_string())),
        Err(e @ ApiError::Decode(_)) => Err(HandlerErr::new("bad_response", e.to_string())),
    }
}
