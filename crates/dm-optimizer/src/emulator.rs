//! Gaussian process emulator strategy (placeholder).

use dm_types::{DmResult, Model, ParameterSpace};
use tracing::info;

use crate::generator::SearchStrategy;
use crate::status::{GeneratorStatus, GPE_EXHAUSTED};
use crate::table::ModelTable;

/// Emulator-driven search. No emulator backend exists yet: it proposes
/// nothing and always reports itself exhausted.
#[derive(Debug, Clone, Default)]
pub struct GaussianProcessEmulator;

impl GaussianProcessEmulator {
    pub fn new() -> Self {
        Self
    }
}

impl SearchStrategy for GaussianProcessEmulator {
    fn name(&self) -> &str {
        "GaussianProcessEmulator"
    }

    fn propose(&mut self, _space: &ParameterSpace, _table: &dyn ModelTable) -> DmResult<Vec<Model>> {
        info!("Gaussian process emulator placeholder - no candidates produced");
        Ok(Vec::new())
    }

    fn check_specific_stopping_criteria(
        &mut self,
        _space: &ParameterSpace,
        _table: &dyn ModelTable,
        status: &mut GeneratorStatus,
    ) -> DmResult<()> {
        status.set_criterion(GPE_EXHAUSTED, true);
        Ok(())
    }
}
