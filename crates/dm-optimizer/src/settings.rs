//! Parameter-space settings: generator choice, stopping criteria, tolerance.

use dm_types::{config_error, DmResult, Tolerance};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::emulator::GaussianProcessEmulator;
use crate::generator::SearchStrategy;
use crate::grid::GridSearch;

/// Which candidate-production strategy drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeneratorKind {
    #[default]
    GridWalk,
    GaussianProcessEmulator,
}

/// Conditions under which the search is declared finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoppingCriteria {
    /// Stop once the table holds this many models.
    pub n_max_mods: usize,
    /// Stop after this many generation rounds.
    pub n_max_iter: Option<usize>,
    /// Stop once a round improves the best chi2 by less than this.
    pub min_delta_chi2: Option<f64>,
}

impl Default for StoppingCriteria {
    fn default() -> Self {
        Self {
            n_max_mods: 100,
            n_max_iter: None,
            min_delta_chi2: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSettings {
    pub which_parameter_generator: GeneratorKind,
    pub stopping_criteria: StoppingCriteria,
    /// Equality tolerance for the novelty filter and the grid walk.
    pub tolerance: Tolerance,
    /// Fit statistic columns whose sum selects the grid center.
    pub chi2_column: String,
    pub kinchi2_column: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            which_parameter_generator: GeneratorKind::GridWalk,
            stopping_criteria: StoppingCriteria::default(),
            tolerance: Tolerance::default(),
            chi2_column: "chi2".to_string(),
            kinchi2_column: "kinchi2".to_string(),
        }
    }
}

impl GeneratorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(mut self, kind: GeneratorKind) -> Self {
        self.which_parameter_generator = kind;
        self
    }

    pub fn with_max_models(mut self, n: usize) -> Self {
        self.stopping_criteria.n_max_mods = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.stopping_criteria.n_max_iter = Some(n);
        self
    }

    pub fn with_min_delta_chi2(mut self, delta: f64) -> Self {
        self.stopping_criteria.min_delta_chi2 = Some(delta);
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_fit_columns(mut self, chi2: &str, kinchi2: &str) -> Self {
        self.chi2_column = chi2.to_string();
        self.kinchi2_column = kinchi2.to_string();
        self
    }

    pub fn from_json_str(json: &str) -> DmResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> DmResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> DmResult<()> {
        let criteria = &self.stopping_criteria;
        if criteria.n_max_mods == 0 {
            return Err(config_error!("n_max_mods must be positive"));
        }
        if criteria.n_max_iter == Some(0) {
            return Err(config_error!("n_max_iter must be positive when set"));
        }
        if let Some(delta) = criteria.min_delta_chi2 {
            if !(delta.is_finite() && delta >= 0.0) {
                return Err(config_error!(
                    "min_delta_chi2 must be a non-negative number, got {}",
                    delta
                ));
            }
        }

        let Tolerance { rtol, atol } = self.tolerance;
        if !(rtol.is_finite() && rtol >= 0.0 && atol.is_finite() && atol >= 0.0) {
            return Err(config_error!(
                "tolerance must be non-negative, got rtol={} atol={}",
                rtol,
                atol
            ));
        }

        if self.chi2_column.is_empty() || self.kinchi2_column.is_empty() {
            return Err(config_error!("fit statistic column names must not be empty"));
        }
        if self.chi2_column == self.kinchi2_column {
            return Err(config_error!(
                "chi2 and kinchi2 columns must differ, both are {}",
                self.chi2_column
            ));
        }
        Ok(())
    }

    /// Instantiate the configured strategy.
    pub fn build_strategy(&self) -> Box<dyn SearchStrategy> {
        match self.which_parameter_generator {
            GeneratorKind::GridWalk => Box::new(GridSearch::from_settings(self)),
            GeneratorKind::GaussianProcessEmulator => Box::new(GaussianProcessEmulator::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_types::DmError;

    #[test]
    fn defaults_are_valid() {
        let settings = GeneratorSettings::new();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.which_parameter_generator, GeneratorKind::GridWalk);
        assert_eq!(settings.tolerance, Tolerance::default());
        assert_eq!(settings.build_strategy().name(), "GridWalk");
    }

    #[test]
    fn parses_json_with_partial_fields() {
        let settings = GeneratorSettings::from_json_str(
            r#"{
                "which_parameter_generator": "GaussianProcessEmulator",
                "stopping_criteria": {"n_max_mods": 20, "min_delta_chi2": 0.5},
                "tolerance": {"rtol": 1e-6}
            }"#,
        )
        .unwrap();
        assert_eq!(settings.stopping_criteria.n_max_mods, 20);
        assert_eq!(settings.stopping_criteria.min_delta_chi2, Some(0.5));
        assert_eq!(settings.stopping_criteria.n_max_iter, None);
        assert_eq!(settings.tolerance.rtol, 1e-6);
        assert_eq!(settings.tolerance.atol, Tolerance::default().atol);
        assert_eq!(settings.chi2_column, "chi2");
        assert_eq!(settings.build_strategy().name(), "GaussianProcessEmulator");
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = GeneratorSettings::from_json_str(r#"{"stopping_criteria": {"n_max": 3}}"#);
        assert!(matches!(result, Err(DmError::Serialization(_))));
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_models = GeneratorSettings::new().with_max_models(0);
        assert!(matches!(zero_models.validate(), Err(DmError::Config(_))));

        let negative_delta = GeneratorSettings::new().with_min_delta_chi2(-1.0);
        assert!(negative_delta.validate().is_err());

        let bad_tolerance = GeneratorSettings::new().with_tolerance(Tolerance::new(-1.0, 0.0));
        assert!(bad_tolerance.validate().is_err());

        let same_columns = GeneratorSettings::new().with_fit_columns("chi2", "chi2");
        assert!(same_columns.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = GeneratorSettings::from_path("/nonexistent/parameter_space_settings.json");
        assert!(matches!(result, Err(DmError::Io(_))));
    }
}
