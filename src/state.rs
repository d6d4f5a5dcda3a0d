//! Explicit engine state and its persistence seam.
//!
//! The engine itself is stateless; everything a session needs to resume is
//! this one value object. Where it gets stored is the adapter's problem:
//! implement [`StateStore`] over whatever backend the host application has.

use crate::error::Result;
use crate::schema::{AccountRecord, AnalysisView, CostBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub records: Vec<AccountRecord>,
    /// Per-account behavior overrides, keyed by code. These take priority
    /// over classifier output and lexicon defaults.
    pub overrides: BTreeMap<String, CostBehavior>,
    pub active_view: AnalysisView,
}

pub trait StateStore {
    fn load(&self) -> Result<Option<EngineState>>;
    fn save(&mut self, state: &EngineState) -> Result<()>;
}

/// Keeps the state as serialized JSON, the way a real adapter would hand
/// it to browser storage or a database column. Mainly for tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    slot: Option<String>,
}

impl StateStore for InMemoryStore {
    fn load(&self) -> Result<Option<EngineState>> {
        match &self.slot {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &EngineState) -> Result<()> {
        self.slot = Some(serde_json::to_string(state)?);
        Ok(())
    }
}
