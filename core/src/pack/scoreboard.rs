//! Integer scores per holder and objective

use crate::engine::CommandSource;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared score table; clones see the same scores
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    scores: Rc<RefCell<BTreeMap<(String, String), i32>>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holder a source's scores are filed under: its entity, else its name
    pub fn holder(source: &CommandSource) -> String {
        source
            .context
            .entity
            .clone()
            .unwrap_or_else(|| source.name.clone())
    }

    pub fn get(&self, holder: &str, objective: &str) -> Option<i32> {
        self.scores
            .borrow()
            .get(&(holder.to_string(), objective.to_string()))
            .copied()
    }

    pub fn set(&self, holder: &str, objective: &str, value: i32) {
        self.scores
            .borrow_mut()
            .insert((holder.to_string(), objective.to_string()), value);
    }

    /// Add to a score (missing scores start at 0); returns the new value
    pub fn add(&self, holder: &str, objective: &str, delta: i32) -> i32 {
        let mut scores = self.scores.borrow_mut();
        let entry = scores
            .entry((holder.to_string(), objective.to_string()))
            .or_insert(0);
        *entry = entry.saturating_add(delta);
        *entry
    }

    /// All scores as `(holder, objective, value)`, sorted
    pub fn entries(&self) -> Vec<(String, String, i32)> {
        self.scores
            .borrow()
            .iter()
            .map(|((holder, objective), value)| (holder.clone(), objective.clone(), *value))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.borrow().is_empty()
    }
}
