//! Grid walk around the current best-fit model.

use dm_types::{
    DmResult, GeneratorError, Model, Parameter, ParameterError, ParameterSpace, Tolerance,
};
use tracing::debug;

use crate::generator::SearchStrategy;
use crate::settings::GeneratorSettings;
use crate::status::{GeneratorStatus, MIN_DELTA_CHI2_REACHED};
use crate::table::ModelTable;

/// Clamp `value` to `[lo, hi]`.
pub fn clip(value: f64, lo: f64, hi: f64) -> Result<f64, GeneratorError> {
    if lo > hi {
        return Err(GeneratorError::InvalidRange { lo, hi });
    }
    Ok(value.max(lo).min(hi))
}

/// Refines the search around the model with the lowest `chi2 + kinchi2`.
///
/// The first call on an empty table proposes the single model with every
/// parameter at its configured value. Later calls step each free parameter
/// one grid step down and up from the center and propose every combination.
#[derive(Debug, Clone)]
pub struct GridSearch {
    tolerance: Tolerance,
    chi2_column: String,
    kinchi2_column: String,
    min_delta_chi2: Option<f64>,
    previous_best: Option<f64>,
}

impl GridSearch {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            chi2_column: "chi2".to_string(),
            kinchi2_column: "kinchi2".to_string(),
            min_delta_chi2: None,
            previous_best: None,
        }
    }

    pub fn from_settings(settings: &GeneratorSettings) -> Self {
        Self {
            tolerance: settings.tolerance,
            chi2_column: settings.chi2_column.clone(),
            kinchi2_column: settings.kinchi2_column.clone(),
            min_delta_chi2: settings.stopping_criteria.min_delta_chi2,
            previous_best: None,
        }
    }

    /// Row index and value of the lowest `chi2 + kinchi2`.
    ///
    /// The first minimum wins; rows whose sum is NaN are never selected.
    pub fn best_fit(&self, table: &dyn ModelTable) -> DmResult<Option<(usize, f64)>> {
        let mut best: Option<(usize, f64)> = None;
        for row in 0..table.len() {
            let total = table.value(row, &self.chi2_column)?
                + table.value(row, &self.kinchi2_column)?;
            if total.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, current)| total < current) {
                best = Some((row, total));
            }
        }
        Ok(best)
    }

    /// Values to try for one parameter around the center coordinate.
    pub fn candidate_values(&self, par: &Parameter, center: f64) -> DmResult<Vec<f64>> {
        if par.fixed {
            if !self.tolerance.is_close(center, par.value) {
                return Err(GeneratorError::InconsistentFixedParameter {
                    name: par.name.clone(),
                    configured: par.value,
                    center,
                }
                .into());
            }
            return Ok(vec![par.value]);
        }

        let grid = par
            .grid_parspace_settings
            .as_ref()
            .ok_or_else(|| ParameterError::Invalid {
                name: par.name.clone(),
                message: "free parameter needs grid_parspace_settings".to_string(),
            })?;
        let minstep = grid.effective_minstep();
        let mut values: Vec<f64> = Vec::with_capacity(3);

        let below = clip(center - grid.step, grid.lo, grid.hi)?;
        if self.spans_minstep(center - below, minstep) {
            values.push(below);
        }

        let mid = clip(center, grid.lo, grid.hi)?;
        if !self.repeats_last(&values, mid) {
            values.push(mid);
        }

        let above = clip(center + grid.step, grid.lo, grid.hi)?;
        if self.spans_minstep(above - center, minstep) && !self.repeats_last(&values, above) {
            values.push(above);
        }

        Ok(values)
    }

    /// A distance that rounds to `minstep` still counts as a full step.
    fn spans_minstep(&self, distance: f64, minstep: f64) -> bool {
        let distance = distance.abs();
        distance >= minstep || self.tolerance.is_close(distance, minstep)
    }

    fn repeats_last(&self, values: &[f64], value: f64) -> bool {
        values
            .last()
            .is_some_and(|last| self.tolerance.is_close(*last, value))
    }

    /// Every combination of per-parameter candidate values around `center`.
    ///
    /// `center` holds one coordinate per parameter in parameter-space order.
    /// Models are enumerated with the earliest parameter varying fastest.
    pub fn grid_walk(&self, space: &ParameterSpace, center: &[f64]) -> DmResult<Vec<Model>> {
        if center.len() != space.len() {
            return Err(GeneratorError::MissingCenter {
                expected: space.len(),
                actual: center.len(),
            }
            .into());
        }

        let mut models = vec![Model::default()];
        for (par, &coordinate) in space.iter().zip(center) {
            let values = self.candidate_values(par, coordinate)?;
            let mut extended = Vec::with_capacity(models.len() * values.len());
            for value in values {
                let snapshot = Parameter {
                    value,
                    ..par.clone()
                };
                for partial in &models {
                    extended.push(partial.extended(snapshot.clone()));
                }
            }
            models = extended;
        }
        Ok(models)
    }
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &str {
        "GridWalk"
    }

    fn propose(&mut self, space: &ParameterSpace, table: &dyn ModelTable) -> DmResult<Vec<Model>> {
        if table.is_empty() {
            return Ok(vec![space.initial_model()]);
        }

        let (center_row, best) = self.best_fit(table)?.ok_or(GeneratorError::MissingCenter {
            expected: space.len(),
            actual: 0,
        })?;
        let center = table.row_values(center_row, space.par_names())?;
        debug!(
            "GridWalk center at row {} with {}+{}={}: {:?}",
            center_row, self.chi2_column, self.kinchi2_column, best, center
        );
        self.grid_walk(space, &center)
    }

    fn check_specific_stopping_criteria(
        &mut self,
        _space: &ParameterSpace,
        table: &dyn ModelTable,
        status: &mut GeneratorStatus,
    ) -> DmResult<()> {
        let reached = match (self.min_delta_chi2, self.best_fit(table)?) {
            (Some(min_delta), Some((_, best))) => {
                let reached = self
                    .previous_best
                    .is_some_and(|previous| previous - best < min_delta);
                debug!(
                    "GridWalk best fit {} (previous {:?}, min delta {})",
                    best, self.previous_best, min_delta
                );
                self.previous_best = Some(best);
                reached
            }
            _ => false,
        };
        status.set_criterion(MIN_DELTA_CHI2_REACHED, reached);
        Ok(())
    }
}
