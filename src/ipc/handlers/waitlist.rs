use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::json;
use tracing::info;

use crate::ipc::error::{envelope, HandlerErr};
use crate::ipc::handlers::school_classes::{class_view_json, fetch_class_view};
use crate::ipc::helpers::{call_api, require_admin, require_array, require_i64, require_session};
use crate::ipc::types::{AppState, Request};
use crate::lookup;
use crate::model::{CompletedEvaluation, SkillDomain, StudentBelt, WaitlistEntry};
use crate::roster;

fn handle_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let student_id = require_i64(req, "studentId")?;
    let skill_domain_id = require_i64(req, "skillDomainId")?;
    let belt_id = require_i64(req, "beltId")?;
    let created = call_api(state, |api| {
        api.add_to_waitlist(student_id, skill_domain_id, belt_id)
    })?;
    if let Some(class) = state.class.as_mut() {
        class.waitlist_entries =
            roster::insert(&class.waitlist_entries, created.waitlist_entry.clone());
    }
    Ok(json!({
        "waitlist_entry": created.waitlist_entry,
        "waitlist_entries": state.class.as_ref().map(|class| &class.waitlist_entries),
    }))
}

fn handle_remove(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let waitlist_entry_id = require_i64(req, "waitlistEntryId")?;
    call_api(state, |api| api.remove_from_waitlist(waitlist_entry_id))?;
    if let Some(class) = state.class.as_mut() {
        class.waitlist_entries = roster::remove(&class.waitlist_entries, waitlist_entry_id);
    }
    Ok(json!({
        "waitlist_entries": state.class.as_ref().map(|class| &class.waitlist_entries),
    }))
}

/// Convert the displayed waitlist into evaluations in one batch. Rows arrive
/// one per pending entry with a completion flag (default on), a date
/// (falling back to the shared `commonDate`) and a success flag (default
/// off). Rows that are not completed or miss a field are excluded from the
/// payload, not rejected. The server recomputes awarded belts during the
/// conversion, so on success the whole class view is refetched instead of
/// patched.
fn handle_convert(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let rows = require_array(req, "rows")?;
    let common_date = req
        .params
        .get("commonDate")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut completed_evaluations = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let waitlist_entry_id = row.get("waitlistEntryId").and_then(|v| v.as_i64());
        let completed = row
            .get("completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let success = row.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
        let date = row
            .get("date")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| common_date.clone());
        let parsed_date = date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        match (waitlist_entry_id, completed, parsed_date) {
            (Some(waitlist_entry_id), true, Some(date)) => {
                completed_evaluations.push(CompletedEvaluation {
                    waitlist_entry_id,
                    date,
                    success,
                });
            }
            _ => skipped += 1,
        }
    }

    if !completed_evaluations.is_empty() {
        call_api(state, |api| api.convert_waitlist(&completed_evaluations))?;
        info!(
            converted = completed_evaluations.len(),
            skipped, "waitlist converted"
        );
    }

    let school_class_id = state.class.as_ref().map(|class| class.school_class.id);
    let class = match school_class_id {
        Some(school_class_id) if !completed_evaluations.is_empty() => {
            let refreshed = fetch_class_view(state, school_class_id)?;
            let view = class_view_json(&refreshed);
            state.class = Some(refreshed);
            Some(view)
        }
        _ => None,
    };

    Ok(json!({
        "converted": completed_evaluations.len(),
        "skipped": skipped,
        "class": class,
    }))
}

/// Render-ready waitlist data for the loaded class: a per-student summary of
/// pending attempts, and one row per student with the belt each skill domain
/// would be attempted at next (the occupant of the rank above the student's
/// current belt, or rank 1 when the student has none). Dangling references
/// degrade to a skipped item or an empty cell, never an error.
fn handle_board(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_session(state)?;
    let class = state
        .class
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_view", "school class view not loaded"))?;

    let belt_by_id = lookup::by_id(&class.belts);
    let belt_by_rank = lookup::by_rank(&class.belts);
    let skill_domain_by_id = lookup::by_id(&class.skill_domains);
    let student_by_id = lookup::by_id(&class.students);

    let mut sorted_domains: Vec<&SkillDomain> = class.skill_domains.iter().collect();
    sorted_domains.sort_by(|a, b| a.code.cmp(&b.code));

    let mut summary = Vec::new();
    for (student_id, entries) in lookup::waitlist_by_student(&class.waitlist_entries, &class.students)
    {
        let Some(student) = lookup::resolve(&student_by_id, student_id, "student") else {
            continue;
        };
        let mut pending = Vec::new();
        for entry in entries {
            let Some(skill_domain) =
                lookup::resolve(&skill_domain_by_id, entry.skill_domain_id, "skill domain")
            else {
                continue;
            };
            let Some(belt) = lookup::resolve(&belt_by_id, entry.belt_id, "belt") else {
                continue;
            };
            pending.push(json!({
                "waitlist_entry_id": entry.id,
                "skill_domain": skill_domain.name,
                "belt": belt.name,
            }));
        }
        summary.push(json!({
            "student_id": student.id,
            "display_name": student.display_name,
            "pending": pending,
        }));
    }

    let awarded_by_student: HashMap<i64, &Vec<StudentBelt>> = class
        .student_belts
        .iter()
        .map(|awarded| (awarded.student_id, &awarded.belts))
        .collect();
    let entry_by_student_domain: HashMap<(i64, i64), &WaitlistEntry> = class
        .waitlist_entries
        .iter()
        .map(|entry| ((entry.student_id, entry.skill_domain_id), entry))
        .collect();

    let mut board = Vec::new();
    for student in &class.students {
        let awarded = awarded_by_student.get(&student.id);
        let mut cells = Vec::new();
        for skill_domain in &sorted_domains {
            let current = awarded
                .and_then(|belts| {
                    belts
                        .iter()
                        .find(|belt| belt.skill_domain_id == skill_domain.id)
                })
                .and_then(|belt| lookup::resolve(&belt_by_id, belt.belt_id, "belt"));
            let next = match current {
                Some(belt) => belt_by_rank.get(&(belt.rank + 1)).copied(),
                None => belt_by_rank.get(&1).copied(),
            };
            let entry = entry_by_student_domain.get(&(student.id, skill_domain.id));
            cells.push(json!({
                "skill_domain_id": skill_domain.id,
                "current_belt_id": current.map(|belt| belt.id),
                "next_belt_id": next.map(|belt| belt.id),
                "waitlist_entry_id": entry.map(|entry| entry.id),
            }));
        }
        board.push(json!({
            "student_id": student.id,
            "display_name": student.display_name,
            "rank": student.rank,
            "cells": cells,
        }));
    }

    Ok(json!({ "summary": summary, "board": board }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "waitlist.add" => handle_add(state, req),
        "waitlist.remove" => handle_remove(state, req),
        "waitlist.convert" => handle_convert(state, req),
        "waitlist.board" => handle_board(state, req),
        _ => return None,
    };
    Some(envelope(&req.id, outcome))
}
