use serde_json::json;
use tracing::error;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{
    call_api, opt_i64, opt_str, require_admin, require_array, require_i64, require_session,
    require_str,
};
use crate::ipc::types::{AppState, Request, StudentView};
use crate::model::StudentRank;
use crate::roster;

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let school_class_id = require_i64(req, "schoolClassId")?;
    let display_name = require_str(req, "displayName")?.to_string();
    let username = require_str(req, "username")?.to_string();
    let password = require_str(req, "password")?.to_string();
    let created = call_api(state, |api| {
        api.create_student(school_class_id, &display_name, &username, &password)
    })?;
    if let Some(class) = state.class.as_mut() {
        if class.school_class.id == school_class_id {
            // ranks come from the server here; renumbering may leave gaps,
            // which are reported rather than papered over
            class.students = roster::insert(&class.students, created.student.clone());
            let gaps = roster::rank_gaps(&class.students);
            if !gaps.is_empty() {
                error!(school_class_id, ?gaps, "inconsistent ranking of students");
            }
        }
    }
    Ok(json!({
        "student": created.student,
        "user": created.user,
        "students": state.class.as_ref().map(|class| &class.students),
    }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let student_id = require_i64(req, "studentId")?;
    let mut fields = serde_json::Map::new();
    if let Some(display_name) = opt_str(req, "displayName") {
        fields.insert("display_name".to_string(), json!(display_name));
    }
    if let Some(username) = opt_str(req, "username") {
        fields.insert("username".to_string(), json!(username));
    }
    if let Some(password) = opt_str(req, "password") {
        fields.insert("password".to_string(), json!(password));
    }
    if let Some(rank) = opt_i64(req, "rank") {
        fields.insert("rank".to_string(), json!(rank));
    }
    if fields.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let fields = serde_json::Value::Object(fields);
    let updated = call_api(state, |api| api.update_student(student_id, &fields))?;
    if let Some(class) = state.class.as_mut() {
        class.students = roster::replace(&class.students, student_id, updated.student.clone());
    }
    if let Some(view) = state.student.as_mut() {
        if view.student.id == student_id {
            view.student = updated.student.clone();
        }
    }
    Ok(json!({
        "student": updated.student,
        "students": state.class.as_ref().map(|class| &class.students),
    }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let student_id = require_i64(req, "studentId")?;
    call_api(state, |api| api.delete_student(student_id))?;
    if let Some(class) = state.class.as_mut() {
        class.students = roster::remove_ranked(&class.students, student_id);
        class.waitlist_entries = class
            .waitlist_entries
            .iter()
            .filter(|entry| entry.student_id != student_id)
            .cloned()
            .collect();
    }
    if state
        .student
        .as_ref()
        .is_some_and(|view| view.student.id == student_id)
    {
        state.student = None;
    }
    Ok(json!({
        "students": state.class.as_ref().map(|class| &class.students),
    }))
}

/// Bulk rank renumbering. The server confirms with the changed students
/// only; each one is merged back by id and the result is re-sorted.
fn handle_update_ranks(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let rows = require_array(req, "ranks")?;
    let mut ranks = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| HandlerErr::new("bad_params", "missing id in ranks row"))?;
        let rank = row
            .get("rank")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| HandlerErr::new("bad_params", "missing rank in ranks row"))?;
        ranks.push(StudentRank {
            id,
            rank: rank as i32,
        });
    }
    let changed = call_api(state, |api| api.update_student_ranks(&ranks))?;
    if let Some(class) = state.class.as_mut() {
        let mut students = class.students.clone();
        for student in &changed.students {
            students = roster::replace(&students, student.id, student.clone());
        }
        let students = roster::sorted_by_rank(&students);
        let gaps = roster::rank_gaps(&students);
        if !gaps.is_empty() {
            error!(?gaps, "inconsistent ranking of students after renumbering");
        }
        class.students = students;
    }
    Ok(json!({
        "changed": changed.students,
        "students": state.class.as_ref().map(|class| &class.students),
    }))
}

fn handle_view(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let student_id = require_i64(req, "studentId")?;
    let detail = call_api(state, |api| api.student_detail(student_id))?;
    let view = StudentView {
        class_level: detail.class_level,
        school_class: detail.school_class,
        student: detail.student,
        belts: roster::sorted_by_rank(&detail.belts),
        skill_domains: detail.skill_domains,
        evaluations: detail.evaluations,
    };
    let result = json!({
        "class_level": &view.class_level,
        "school_class": &view.school_class,
        "student": &view.student,
        "belts": &view.belts,
        "skill_domains": &view.skill_domains,
        "evaluations": &view.evaluations,
    });
    state.student = Some(view);
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        "students.updateRanks" => handle_update_ranks(state, req),
        "student.view" => handle_view(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
