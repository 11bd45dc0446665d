//! Manual ordering of rows within a scope
//!
//! A reorder is planned in memory against the scope's current id sequence,
//! then written back as dense positions `0..n`. Only rows whose position
//! actually changes need an update.

use serde::Serialize;
use std::collections::HashSet;

/// A requested change to the order of one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderChange {
    MoveUp(i64),
    MoveDown(i64),
    /// Move the row to an index, clamped into range
    MoveTo(i64, usize),
    /// Replace the whole order; must be a permutation of the scope
    Replace(Vec<i64>),
}

impl OrderChange {
    /// The row whose scope the change applies to, if it names one
    pub fn anchor(&self) -> Option<i64> {
        match self {
            Self::MoveUp(id) | Self::MoveDown(id) | Self::MoveTo(id, _) => Some(*id),
            Self::Replace(ids) => ids.first().copied(),
        }
    }

    /// Compute the new id sequence from the current one
    pub fn apply(&self, current: &[i64]) -> Result<Vec<i64>, OrderError> {
        let mut order = current.to_vec();
        match self {
            Self::MoveUp(id) => {
                let idx = index_of(&order, *id)?;
                if idx > 0 {
                    order.swap(idx, idx - 1);
                }
            }
            Self::MoveDown(id) => {
                let idx = index_of(&order, *id)?;
                if idx + 1 < order.len() {
                    order.swap(idx, idx + 1);
                }
            }
            Self::MoveTo(id, target) => {
                let idx = index_of(&order, *id)?;
                let item = order.remove(idx);
                let target = (*target).min(order.len());
                order.insert(target, item);
            }
            Self::Replace(ids) => {
                if ids.len() != current.len() {
                    return Err(OrderError::NotAPermutation);
                }
                let expected: HashSet<i64> = current.iter().copied().collect();
                let given: HashSet<i64> = ids.iter().copied().collect();
                if given.len() != ids.len() || given != expected {
                    return Err(OrderError::NotAPermutation);
                }
                order = ids.clone();
            }
        }
        Ok(order)
    }
}

fn index_of(order: &[i64], id: i64) -> Result<usize, OrderError> {
    order
        .iter()
        .position(|&x| x == id)
        .ok_or(OrderError::UnknownId(id))
}

/// Why a reorder was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum OrderError {
    #[error("Row {0} is not part of this list")]
    UnknownId(i64),
    #[error("Order must list every row of the list exactly once")]
    NotAPermutation,
}

/// Position writes needed to turn `current` (id, position) pairs into `order`
pub fn position_updates(current: &[(i64, i32)], order: &[i64]) -> Vec<(i64, i32)> {
    order
        .iter()
        .enumerate()
        .filter_map(|(idx, &id)| {
            let wanted = idx as i32;
            let existing = current.iter().find(|(cid, _)| *cid == id).map(|(_, p)| *p);
            (existing != Some(wanted)).then_some((id, wanted))
        })
        .collect()
}
