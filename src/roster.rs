//! Collection bookkeeping shared by every view: keeping an in-memory list in
//! step with server-confirmed mutations, and keeping rank-ordered lists
//! contiguous (ranks exactly 1..=N) across create, delete and move.
//!
//! All operations are copy-on-write: they take a slice and hand back a fresh
//! `Vec`, so a caller can only ever commit a fully-formed collection.

use std::collections::HashSet;

pub trait HasId {
    fn id(&self) -> i64;
}

pub trait Ranked: HasId {
    fn rank(&self) -> i32;
    fn set_rank(&mut self, rank: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// The moved element is not in the collection.
    NotFound,
    /// The destination rank falls outside 1..=N.
    OutOfBounds,
    /// No element currently holds the destination rank. The collection has
    /// drifted from the server and must be refetched.
    NoOccupant,
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveError::NotFound => write!(f, "element not found"),
            MoveError::OutOfBounds => write!(f, "destination rank out of bounds"),
            MoveError::NoOccupant => write!(f, "no element at destination rank"),
        }
    }
}

pub fn insert<T: Clone>(items: &[T], item: T) -> Vec<T> {
    let mut next = items.to_vec();
    next.push(item);
    next
}

/// Append a freshly created element, assigning the next contiguous rank. The
/// server assigns the same rank on its side (create appends at the end), so
/// this never disagrees with a confirmed creation.
pub fn insert_ranked<T: Ranked + Clone>(items: &[T], mut item: T) -> Vec<T> {
    item.set_rank(items.len() as i32 + 1);
    insert(items, item)
}

/// Overwrite the element with the matching id. Unknown ids leave the
/// collection unchanged rather than failing: the element may have been
/// removed by another view since the mutation was issued.
pub fn replace<T: HasId + Clone>(items: &[T], id: i64, item: T) -> Vec<T> {
    let mut next = items.to_vec();
    if let Some(index) = next.iter().position(|candidate| candidate.id() == id) {
        next[index] = item;
    }
    next
}

pub fn remove<T: HasId + Clone>(items: &[T], id: i64) -> Vec<T> {
    let mut next = items.to_vec();
    if let Some(index) = next.iter().position(|candidate| candidate.id() == id) {
        next.remove(index);
    }
    next
}

/// Remove a ranked element and close the gap: every element whose rank
/// exceeded the removed one moves down by one, restoring ranks 1..=N-1.
pub fn remove_ranked<T: Ranked + Clone>(items: &[T], id: i64) -> Vec<T> {
    let Some(removed_rank) = items
        .iter()
        .find(|candidate| candidate.id() == id)
        .map(Ranked::rank)
    else {
        return items.to_vec();
    };
    let mut next: Vec<T> = items
        .iter()
        .filter(|candidate| candidate.id() != id)
        .cloned()
        .collect();
    for item in &mut next {
        if item.rank() > removed_rank {
            let rank = item.rank() - 1;
            item.set_rank(rank);
        }
    }
    next
}

/// Swap the element's rank with the current occupant of `rank + delta`.
///
/// The rank-patch endpoint confirms the move without returning the reordered
/// collection, so the local order is re-derived here: exactly two elements
/// change rank, and the result comes back sorted by rank.
pub fn move_swap<T: Ranked + Clone>(items: &[T], id: i64, delta: i32) -> Result<Vec<T>, MoveError> {
    let mover = items
        .iter()
        .find(|candidate| candidate.id() == id)
        .ok_or(MoveError::NotFound)?;
    let from = mover.rank();
    let to = from + delta;
    if to < 1 || to > items.len() as i32 {
        return Err(MoveError::OutOfBounds);
    }
    let occupant = items
        .iter()
        .find(|candidate| candidate.rank() == to)
        .ok_or(MoveError::NoOccupant)?;
    let occupant_id = occupant.id();

    let mut next = items.to_vec();
    for item in &mut next {
        if item.id() == id {
            item.set_rank(to);
        } else if item.id() == occupant_id {
            item.set_rank(from);
        }
    }
    next.sort_by_key(Ranked::rank);
    Ok(next)
}

pub fn sorted_by_rank<T: Ranked + Clone>(items: &[T]) -> Vec<T> {
    let mut next = items.to_vec();
    next.sort_by_key(Ranked::rank);
    next
}

/// Ids whose rank breaks the 1..=N sequence (duplicates included). An empty
/// result means the multiset of ranks is exactly {1..N}.
pub fn rank_gaps<T: Ranked>(items: &[T]) -> Vec<i64> {
    let mut seen: HashSet<i32> = HashSet::new();
    let mut offenders = Vec::new();
    for item in items {
        let rank = item.rank();
        if rank < 1 || rank > items.len() as i32 || !seen.insert(rank) {
            offenders.push(item.id());
        }
    }
    offenders
}
