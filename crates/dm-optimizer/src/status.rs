//! Generator status reported back to the driver loop.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row count reached the configured maximum.
pub const N_MAX_MODS_REACHED: &str = "n_max_mods_reached";
/// Number of generation rounds reached the configured maximum.
pub const N_MAX_ITER_REACHED: &str = "n_max_iter_reached";
/// Best fit improved by less than the configured minimum since the last round.
pub const MIN_DELTA_CHI2_REACHED: &str = "min_delta_chi2_reached";
/// The emulator has nothing left to propose.
pub const GPE_EXHAUSTED: &str = "gpe_exhausted";

/// Stopping-criterion flags plus the outcome of the last `generate` call.
///
/// Criterion flags persist across calls until a check overwrites them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorStatus {
    #[serde(flatten)]
    pub criteria: BTreeMap<String, bool>,
    pub stop: bool,
    pub n_new_models: usize,
    pub last_iteration_added_no_new_models: bool,
}

impl GeneratorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_criterion(&mut self, name: &str, reached: bool) {
        self.criteria.insert(name.to_string(), reached);
    }

    pub fn criterion(&self, name: &str) -> Option<bool> {
        self.criteria.get(name).copied()
    }

    /// Names of every criterion currently flagged.
    pub fn reached_criteria(&self) -> Vec<&str> {
        self.criteria
            .iter()
            .filter(|(_, reached)| **reached)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// OR over every boolean status entry except `stop` itself.
    pub fn any_flag_set(&self) -> bool {
        self.last_iteration_added_no_new_models || self.criteria.values().any(|r| *r)
    }
}
