//! Ordered stack selection with a store lock.
//!
//! The store lock is `Some` exactly when the selection is non-empty, and it
//! always equals the store of every selected deal.

use crate::domain::{Deal, DealId, StoreId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("A stack is already in progress. Add or remove deals instead.")]
    NotEmpty,
    #[error("This deal has no store and cannot be stacked.")]
    MissingStore,
    #[error("All deals in a stack must be from the same store (stack uses store {locked}, deal is from store {found}).")]
    StoreMismatch { locked: StoreId, found: StoreId },
    #[error("A stack can contain at most one direct deal.")]
    DuplicateDirect,
    #[error("A stacked deal cannot be part of another stack.")]
    NestedStack,
    #[error("Position {index} is out of range for a stack of {len} deals.")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    SelectFirst(Deal),
    Toggle(Deal),
    Reorder { from: usize, to: usize },
    Clear,
}

/// What a successful toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleEffect {
    Added,
    Removed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSelection {
    deals: Vec<Deal>,
    store_lock: Option<StoreId>,
}

impl StackSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn ids(&self) -> Vec<DealId> {
        self.deals.iter().map(|d| d.id).collect()
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    pub fn store_lock(&self) -> Option<StoreId> {
        self.store_lock
    }

    pub fn contains(&self, id: DealId) -> bool {
        self.deals.iter().any(|d| d.id == id)
    }

    pub fn get(&self, id: DealId) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    pub fn select_first(&mut self, deal: Deal) -> Result<(), SelectionError> {
        if !self.deals.is_empty() {
            return Err(SelectionError::NotEmpty);
        }
        if !deal.deal_type.is_stackable() {
            return Err(SelectionError::NestedStack);
        }
        let store = deal.store_id.ok_or(SelectionError::MissingStore)?;

        self.store_lock = Some(store);
        self.deals.push(deal);
        Ok(())
    }

    pub fn toggle(&mut self, deal: Deal) -> Result<ToggleEffect, SelectionError> {
        if let Some(pos) = self.deals.iter().position(|d| d.id == deal.id) {
            self.deals.remove(pos);
            if self.deals.is_empty() {
                self.store_lock = None;
            }
            return Ok(ToggleEffect::Removed);
        }

        self.check_can_add(&deal)?;
        if self.store_lock.is_none() {
            self.store_lock = deal.store_id;
        }
        self.deals.push(deal);
        Ok(ToggleEffect::Added)
    }

    /// Remove-then-insert: the element at `from` ends up at `to` and every
    /// other element keeps its relative order.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), SelectionError> {
        let len = self.deals.len();
        for index in [from, to] {
            if index >= len {
                return Err(SelectionError::IndexOutOfRange { index, len });
            }
        }
        if from != to {
            let deal = self.deals.remove(from);
            self.deals.insert(to, deal);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.deals.clear();
        self.store_lock = None;
    }

    fn check_can_add(&self, deal: &Deal) -> Result<(), SelectionError> {
        if !deal.deal_type.is_stackable() {
            return Err(SelectionError::NestedStack);
        }
        let store = deal.store_id.ok_or(SelectionError::MissingStore)?;
        if let Some(locked) = self.store_lock {
            if locked != store {
                return Err(SelectionError::StoreMismatch {
                    locked,
                    found: store,
                });
            }
        }
        if deal.is_direct() && self.deals.iter().any(Deal::is_direct) {
            return Err(SelectionError::DuplicateDirect);
        }
        Ok(())
    }
}

/// Pure transition: returns the next state, or the rejection with the
/// input state untouched.
pub fn reduce(
    state: &StackSelection,
    action: SelectionAction,
) -> Result<StackSelection, SelectionError> {
    let mut next = state.clone();
    match action {
        SelectionAction::SelectFirst(deal) => next.select_first(deal)?,
        SelectionAction::Toggle(deal) => {
            next.toggle(deal)?;
        }
        SelectionAction::Reorder { from, to } => next.reorder(from, to)?,
        SelectionAction::Clear => next.clear(),
    }
    Ok(next)
}
