//! Per-request lookup tables for resolving foreign-key fields across the
//! collections of an aggregate view. A miss is a data inconsistency, not a
//! failure: `resolve` records a diagnostic and the caller degrades to a
//! placeholder.

use std::collections::HashMap;

use tracing::error;

use crate::model::{Student, WaitlistEntry};
use crate::roster::{HasId, Ranked};

/// Build an id -> element table with one fold. Duplicate ids keep the
/// last-seen element.
pub fn by_id<T: HasId>(items: &[T]) -> HashMap<i64, &T> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        map.insert(item.id(), item);
    }
    map
}

/// Build a rank -> element table. Duplicate ranks keep the last-seen element;
/// `roster::rank_gaps` is the place that reports them.
pub fn by_rank<T: Ranked>(items: &[T]) -> HashMap<i32, &T> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        map.insert(item.rank(), item);
    }
    map
}

/// Resolve a foreign-key reference, recording a diagnostic on a miss.
pub fn resolve<'a, T>(map: &HashMap<i64, &'a T>, id: i64, what: &str) -> Option<&'a T> {
    let found = map.get(&id).copied();
    if found.is_none() {
        error!(id, what, "dangling reference");
    }
    found
}

/// Group waitlist entries per student, ordered by the students' class rank.
/// Entries whose student is unknown are dropped with a diagnostic.
pub fn waitlist_by_student<'a>(
    entries: &'a [WaitlistEntry],
    students: &[Student],
) -> Vec<(i64, Vec<&'a WaitlistEntry>)> {
    let student_by_id = by_id(students);
    let mut grouped: Vec<(i64, Vec<&WaitlistEntry>)> = Vec::new();
    for entry in entries {
        if resolve(&student_by_id, entry.student_id, "student").is_none() {
            continue;
        }
        match grouped.iter_mut().find(|(id, _)| *id == entry.student_id) {
            Some((_, bucket)) => bucket.push(entry),
            None => grouped.push((entry.student_id, vec![entry])),
        }
    }
    grouped.sort_by_key(|(student_id, _)| {
        student_by_id
            .get(student_id)
            .map(|student| student.rank)
            .unwrap_or(i32::MAX)
    });
    grouped
}
