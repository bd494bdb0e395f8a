//! Atomically swapped rule-set snapshots.
//!
//! The active rule set is process-wide, read-mostly state. Readers take an
//! `Arc` clone of the current engine and evaluate against that snapshot —
//! they can never observe a partially updated set. `reload()` is
//! all-or-nothing: a rule file that fails to parse or compile leaves the
//! previous engine in force.

use crate::rules::engine::RuleEngine;
use crate::rules::parser::parse_ruleset_file;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Holds the active `RuleEngine` and the file it was loaded from.
pub struct RuleStore {
    path: PathBuf,
    engine: RwLock<Arc<RuleEngine>>,
}

impl RuleStore {
    /// Load the rule file and build the initial engine.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let engine = Arc::new(RuleEngine::new(parse_ruleset_file(&path)?)?);
        Ok(Self {
            path,
            engine: RwLock::new(engine),
        })
    }

    /// Snapshot of the current engine. Cheap; callers keep evaluating
    /// against it even if a reload lands mid-request.
    pub fn engine(&self) -> Arc<RuleEngine> {
        self.engine
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read the rule file and swap the engine in one step.
    /// On any parse or compile error the active engine is untouched.
    /// In-flight approvals are unaffected either way — they live in the
    /// coordinator, not here.
    pub fn reload(&self) -> Result<usize> {
        let engine = Arc::new(RuleEngine::new(parse_ruleset_file(&self.path)?)?);
        let count = engine.rule_count();
        let mut active = self
            .engine
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = engine;
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
