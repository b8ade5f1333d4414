use serde_json::json;
use tracing::error;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::helpers::{call_api, require_admin, require_i64, require_session, require_str};
use crate::ipc::types::{AppState, ClassView, Request};
use crate::roster;
use crate::spool;

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let class_level_id = require_i64(req, "classLevelId")?;
    let suffix = require_str(req, "suffix")?.to_string();
    let created = call_api(state, |api| api.create_school_class(class_level_id, &suffix))?;
    if let Some(level) = state.level.as_mut() {
        if level.class_level.id == class_level_id {
            level.school_classes =
                roster::insert(&level.school_classes, created.school_class.clone());
        }
    }
    Ok(json!({
        "school_class": created.school_class,
        "school_classes": state
            .level
            .as_ref()
            .filter(|level| level.class_level.id == class_level_id)
            .map(|level| &level.school_classes),
    }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let school_class_id = require_i64(req, "schoolClassId")?;
    let suffix = require_str(req, "suffix")?.to_string();
    let fields = json!({ "suffix": suffix });
    let updated = call_api(state, |api| api.update_school_class(school_class_id, &fields))?;
    if let Some(level) = state.level.as_mut() {
        level.school_classes = roster::replace(
            &level.school_classes,
            school_class_id,
            updated.school_class.clone(),
        );
    }
    if let Some(class) = state.class.as_mut() {
        if class.school_class.id == school_class_id {
            class.school_class = updated.school_class.clone();
        }
    }
    Ok(json!({
        "school_class": updated.school_class,
        "school_classes": state.level.as_ref().map(|level| &level.school_classes),
    }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let school_class_id = require_i64(req, "schoolClassId")?;
    call_api(state, |api| api.delete_school_class(school_class_id))?;
    if let Some(level) = state.level.as_mut() {
        level.school_classes = roster::remove(&level.school_classes, school_class_id);
    }
    if state
        .class
        .as_ref()
        .is_some_and(|class| class.school_class.id == school_class_id)
    {
        state.class = None;
    }
    Ok(json!({
        "school_classes": state.level.as_ref().map(|level| &level.school_classes),
    }))
}

/// Fetch the aggregate class view (students plus denormalized context) and
/// the class waitlist in one go.
pub fn fetch_class_view(
    state: &mut AppState,
    school_class_id: i64,
) -> Result<ClassView, HandlerErr> {
    let detail = call_api(state, |api| api.school_class_detail(school_class_id))?;
    let waitlist = call_api(state, |api| api.school_class_waitlist(school_class_id))?;
    let students = roster::sorted_by_rank(&detail.students);
    let gaps = roster::rank_gaps(&students);
    if !gaps.is_empty() {
        error!(school_class_id, ?gaps, "inconsistent ranking of students");
    }
    Ok(ClassView {
        class_level: detail.class_level,
        school_class: detail.school_class,
        students,
        belts: roster::sorted_by_rank(&detail.belts),
        skill_domains: detail.skill_domains,
        student_belts: detail.student_belts,
        waitlist_entries: waitlist.waitlist_entries,
    })
}

pub fn class_view_json(class: &ClassView) -> serde_json::Value {
    json!({
        "class_level": &class.class_level,
        "school_class": &class.school_class,
        "students": &class.students,
        "belts": &class.belts,
        "skill_domains": &class.skill_domains,
        "student_belts": &class.student_belts,
        "waitlist_entries": &class.waitlist_entries,
    })
}

fn handle_view(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let school_class_id = require_i64(req, "schoolClassId")?;
    let class = fetch_class_view(state, school_class_id)?;
    let result = class_view_json(&class);
    state.class = Some(class);
    Ok(result)
}

/// Download the class's printable exam PDF and spool it for the shell.
fn handle_exam_pdf(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let school_class_id = require_i64(req, "schoolClassId")?;
    let bytes = call_api(state, |api| api.school_class_exam_pdf(school_class_id))?;
    let summary = spool::spool_document("exam.pdf", &bytes)
        .map_err(|e| HandlerErr::new("io_error", e.to_string()))?;
    Ok(json!({
        "path": summary.path.to_string_lossy(),
        "bytes": summary.bytes,
        "sha256": summary.sha256,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "schoolClasses.create" => handle_create(state, req),
        "schoolClasses.update" => handle_update(state, req),
        "schoolClasses.delete" => handle_delete(state, req),
        "schoolClass.view" => handle_view(state, req),
        "schoolClass.examPdf" => handle_exam_pdf(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
