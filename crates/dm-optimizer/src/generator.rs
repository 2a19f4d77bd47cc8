//! Generation loop shared by every search strategy.

use dm_types::{DmResult, GeneratorError, Model, ParameterSpace};
use tracing::{debug, info, warn};

use crate::settings::GeneratorSettings;
use crate::status::{GeneratorStatus, N_MAX_ITER_REACHED, N_MAX_MODS_REACHED};
use crate::table::ModelTable;

/// A candidate-production strategy.
pub trait SearchStrategy: Send {
    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Propose the next batch of models. Duplicates of existing rows are
    /// allowed; the generator filters them out.
    fn propose(&mut self, space: &ParameterSpace, table: &dyn ModelTable) -> DmResult<Vec<Model>>;

    /// Record strategy-specific stopping criteria in `status`.
    fn check_specific_stopping_criteria(
        &mut self,
        space: &ParameterSpace,
        table: &dyn ModelTable,
        status: &mut GeneratorStatus,
    ) -> DmResult<()>;
}

/// Decides which models are evaluated next.
pub struct ParameterGenerator {
    par_space: ParameterSpace,
    settings: GeneratorSettings,
    strategy: Box<dyn SearchStrategy>,
    status: GeneratorStatus,
    iteration: usize,
}

impl ParameterGenerator {
    /// Build a generator running the strategy named in `settings`.
    pub fn new(par_space: ParameterSpace, settings: GeneratorSettings) -> DmResult<Self> {
        let strategy = settings.build_strategy();
        Self::with_strategy(par_space, settings, strategy)
    }

    pub fn with_strategy(
        par_space: ParameterSpace,
        settings: GeneratorSettings,
        strategy: Box<dyn SearchStrategy>,
    ) -> DmResult<Self> {
        settings.validate()?;
        Ok(Self {
            par_space,
            settings,
            strategy,
            status: GeneratorStatus::new(),
            iteration: 0,
        })
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn par_space(&self) -> &ParameterSpace {
        &self.par_space
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn status(&self) -> &GeneratorStatus {
        &self.status
    }

    /// Number of rounds in which candidates were produced.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Run one generation round against `current_models`.
    ///
    /// New models are appended to the table; the returned status tells the
    /// driver whether to keep going. A round that adds nothing stops the
    /// search.
    pub fn generate(
        &mut self,
        current_models: Option<&mut dyn ModelTable>,
    ) -> DmResult<GeneratorStatus> {
        let table = current_models.ok_or_else(|| GeneratorError::MissingCollaborator {
            what: "generate needs a model table".to_string(),
        })?;
        self.check_table_schema(&*table)?;

        self.check_stopping_criteria(&*table)?;

        let mut new_models = 0;
        if self.status.stop {
            debug!(
                "{} stopping before generation: {:?}",
                self.name(),
                self.status.reached_criteria()
            );
        } else {
            let candidates = self.strategy.propose(&self.par_space, &*table)?;
            self.iteration += 1;
            debug!(
                "{} proposed {} candidate models in iteration {}",
                self.name(),
                candidates.len(),
                self.iteration
            );
            if candidates.is_empty() {
                warn!("{} proposed no candidate models", self.name());
            }

            for candidate in &candidates {
                self.check_model(candidate)?;
            }
            for candidate in &candidates {
                if self.is_new_model(candidate, &*table)? {
                    table.append_row(&candidate.values())?;
                    new_models += 1;
                }
            }
        }

        info!("{} added {} new models", self.name(), new_models);
        self.status.n_new_models = new_models;
        self.status.last_iteration_added_no_new_models = new_models == 0;
        if new_models == 0 {
            self.status.stop = true;
        }
        Ok(self.status.clone())
    }

    /// Refresh every stopping criterion and the aggregate `stop` flag.
    pub fn check_stopping_criteria(&mut self, table: &dyn ModelTable) -> DmResult<()> {
        self.status.stop = false;
        self.check_generic_stopping_criteria(table);
        self.strategy
            .check_specific_stopping_criteria(&self.par_space, table, &mut self.status)?;
        self.status.stop = self.status.any_flag_set();
        Ok(())
    }

    fn check_generic_stopping_criteria(&mut self, table: &dyn ModelTable) {
        let criteria = &self.settings.stopping_criteria;
        let max_mods_reached = table.len() >= criteria.n_max_mods;
        let max_iter_reached = criteria
            .n_max_iter
            .is_some_and(|n_max_iter| self.iteration >= n_max_iter);
        self.status
            .set_criterion(N_MAX_MODS_REACHED, max_mods_reached);
        self.status
            .set_criterion(N_MAX_ITER_REACHED, max_iter_reached);
    }

    /// Whether no existing row matches `model` within tolerance on every
    /// parameter.
    pub fn is_new_model(&self, model: &Model, table: &dyn ModelTable) -> DmResult<bool> {
        self.check_model(model)?;
        let values = model.values();
        for row in 0..table.len() {
            let existing = table.row_values(row, self.par_space.par_names())?;
            if self.settings.tolerance.all_close(&existing, &values) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether two models carry the same parameters with equal values.
    pub fn model_compare(&self, model1: &Model, model2: &Model) -> bool {
        model1.len() == model2.len()
            && model1
                .parameters()
                .iter()
                .zip(model2.parameters())
                .all(|(p1, p2)| {
                    p1.name == p2.name && self.settings.tolerance.is_close(p1.value, p2.value)
                })
    }

    fn check_model(&self, model: &Model) -> Result<(), GeneratorError> {
        if model.len() != self.par_space.len() {
            return Err(GeneratorError::InvalidModel {
                message: format!(
                    "model has {} parameters, parameter space has {}",
                    model.len(),
                    self.par_space.len()
                ),
            });
        }
        for (par, expected) in model.parameters().iter().zip(self.par_space.par_names()) {
            if &par.name != expected {
                return Err(GeneratorError::InvalidModel {
                    message: format!("expected parameter {expected}, found {}", par.name),
                });
            }
        }
        Ok(())
    }

    fn check_table_schema(&self, table: &dyn ModelTable) -> Result<(), GeneratorError> {
        let columns = table.column_names();
        for (idx, name) in self.par_space.par_names().iter().enumerate() {
            if columns.get(idx) != Some(name) {
                return Err(GeneratorError::TableSchema {
                    column: name.clone(),
                });
            }
        }
        for fit_column in [&self.settings.chi2_column, &self.settings.kinchi2_column] {
            if table.column_type(fit_column).is_none() {
                return Err(GeneratorError::TableSchema {
                    column: fit_column.clone(),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ParameterGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterGenerator")
            .field("name", &self.name())
            .field("par_space", &self.par_space.par_names())
            .field("iteration", &self.iteration)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GeneratorKind;
    use crate::status::{GPE_EXHAUSTED, MIN_DELTA_CHI2_REACHED};
    use crate::table::{AllModels, CellValue};
    use dm_types::{
        Component, ComponentKind, DmError, GridSettings, Parameter, System, Tolerance,
    };

    /// A fixed, B free on [0, 10] with step 2 and minstep 1.
    fn ab_space() -> ParameterSpace {
        ParameterSpace::from_parameters(vec![
            Parameter::fixed("A", 2.0),
            Parameter::free("B", 5.0, GridSettings::new(0.0, 10.0, 2.0).with_minstep(1.0)),
        ])
        .unwrap()
    }

    fn grid_generator(space: &ParameterSpace, settings: GeneratorSettings) -> ParameterGenerator {
        ParameterGenerator::new(space.clone(), settings).unwrap()
    }

    fn parameter_rows(table: &AllModels) -> Vec<Vec<f64>> {
        let names = ["A".to_string(), "B".to_string()];
        (0..table.len())
            .map(|row| table.row_values(row, &names).unwrap())
            .collect()
    }

    /// Fill chi2 as a parabola in B centered on `best_b`.
    fn evaluate(table: &mut AllModels, best_b: f64) {
        for row in 0..table.len() {
            let b = table.value(row, "B").unwrap();
            table
                .set_result(row, "chi2", CellValue::Float((b - best_b).powi(2) + 1.0))
                .unwrap();
            table
                .set_result(row, "kinchi2", CellValue::Float(0.5))
                .unwrap();
        }
    }

    /// Proposes a fixed list of models every round.
    struct FixedProposals(Vec<Model>);

    impl SearchStrategy for FixedProposals {
        fn name(&self) -> &str {
            "fixed"
        }

        fn propose(&mut self, _: &ParameterSpace, _: &dyn ModelTable) -> DmResult<Vec<Model>> {
            Ok(self.0.clone())
        }

        fn check_specific_stopping_criteria(
            &mut self,
            _: &ParameterSpace,
            _: &dyn ModelTable,
            _: &mut GeneratorStatus,
        ) -> DmResult<()> {
            Ok(())
        }
    }

    fn model(a: f64, b: f64) -> Model {
        let space = ab_space();
        Model::new(vec![
            Parameter {
                value: a,
                ..space.parameters()[0].clone()
            },
            Parameter {
                value: b,
                ..space.parameters()[1].clone()
            },
        ])
    }

    #[test]
    fn bootstrap_adds_initial_model() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(&space, GeneratorSettings::new());

        let status = generator.generate(Some(&mut table)).unwrap();

        assert_eq!(status.n_new_models, 1);
        assert!(!status.stop);
        assert!(!status.last_iteration_added_no_new_models);
        assert_eq!(parameter_rows(&table), vec![vec![2.0, 5.0]]);
        assert_eq!(table.value(0, "chi2").unwrap(), 0.0);
        assert_eq!(generator.iteration(), 1);
    }

    #[test]
    fn end_to_end_grid_walk_deduplicates_center() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(&space, GeneratorSettings::new());

        generator.generate(Some(&mut table)).unwrap();
        let status = generator.generate(Some(&mut table)).unwrap();

        assert_eq!(status.n_new_models, 2);
        assert!(!status.stop);
        assert_eq!(
            parameter_rows(&table),
            vec![vec![2.0, 5.0], vec![2.0, 3.0], vec![2.0, 7.0]]
        );
    }

    #[test]
    fn search_walks_to_best_fit_and_stops() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(&space, GeneratorSettings::new());

        let mut rounds = 0;
        loop {
            let status = generator.generate(Some(&mut table)).unwrap();
            if status.stop {
                assert_eq!(status.n_new_models, 0);
                assert!(status.last_iteration_added_no_new_models);
                break;
            }
            evaluate(&mut table, 9.0);
            rounds += 1;
            assert!(rounds < 20, "search did not converge");
        }

        // 5 -> 7 -> 9, the upper neighbour of 9 clips to 10
        let b_values: Vec<f64> = parameter_rows(&table).iter().map(|r| r[1]).collect();
        assert_eq!(b_values, vec![5.0, 3.0, 7.0, 9.0, 10.0]);
    }

    #[test]
    fn max_models_stops_generation() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(&space, GeneratorSettings::new().with_max_models(1));

        generator.generate(Some(&mut table)).unwrap();
        for _ in 0..3 {
            let status = generator.generate(Some(&mut table)).unwrap();
            assert_eq!(status.n_new_models, 0);
            assert!(status.stop);
            assert_eq!(status.criterion(N_MAX_MODS_REACHED), Some(true));
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn max_iterations_stops_generation() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator =
            grid_generator(&space, GeneratorSettings::new().with_max_iterations(2));

        generator.generate(Some(&mut table)).unwrap();
        evaluate(&mut table, 9.0);
        generator.generate(Some(&mut table)).unwrap();
        evaluate(&mut table, 9.0);
        let status = generator.generate(Some(&mut table)).unwrap();

        assert!(status.stop);
        assert_eq!(status.criterion(N_MAX_ITER_REACHED), Some(true));
        assert_eq!(generator.iteration(), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn min_delta_chi2_stops_when_fit_stalls() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator =
            grid_generator(&space, GeneratorSettings::new().with_min_delta_chi2(0.1));

        generator.generate(Some(&mut table)).unwrap();
        // best fit already at the bootstrap model
        evaluate(&mut table, 5.0);
        let status = generator.generate(Some(&mut table)).unwrap();
        assert_eq!(status.criterion(MIN_DELTA_CHI2_REACHED), Some(false));
        assert_eq!(status.n_new_models, 2);

        evaluate(&mut table, 5.0);
        let status = generator.generate(Some(&mut table)).unwrap();
        assert_eq!(status.criterion(MIN_DELTA_CHI2_REACHED), Some(true));
        assert!(status.stop);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn empty_round_keeps_stopping() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        table.append_row(&[2.0, 5.0]).unwrap();
        let mut generator = ParameterGenerator::with_strategy(
            space.clone(),
            GeneratorSettings::new(),
            Box::new(FixedProposals(vec![model(2.0, 5.0)])),
        )
        .unwrap();

        let status = generator.generate(Some(&mut table)).unwrap();
        assert_eq!(status.n_new_models, 0);
        assert!(status.stop);

        // the empty-round flag itself keeps the search stopped
        let status = generator.generate(Some(&mut table)).unwrap();
        assert!(status.stop);
        assert_eq!(generator.iteration(), 1);
    }

    #[test]
    fn decimal_step_keeps_searching_after_bootstrap() {
        let space = ParameterSpace::from_parameters(vec![Parameter::free(
            "q",
            0.5,
            GridSettings::new(0.0, 1.0, 0.1),
        )])
        .unwrap();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(&space, GeneratorSettings::new());

        let status = generator.generate(Some(&mut table)).unwrap();
        assert_eq!(status.n_new_models, 1);
        table.set_result(0, "chi2", CellValue::Float(1.0)).unwrap();

        let status = generator.generate(Some(&mut table)).unwrap();
        assert_eq!(status.n_new_models, 2);
        assert!(!status.stop);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn novelty_filter_uses_tolerance() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        table.append_row(&[2.0, 5.0]).unwrap();
        let generator = grid_generator(
            &space,
            GeneratorSettings::new().with_tolerance(Tolerance::new(1e-6, 0.0)),
        );

        assert!(!generator.is_new_model(&model(2.0, 5.0), &table).unwrap());
        assert!(!generator
            .is_new_model(&model(2.0, 5.0 * (1.0 + 1e-8)), &table)
            .unwrap());
        assert!(generator
            .is_new_model(&model(2.0, 5.0 * (1.0 + 1e-4)), &table)
            .unwrap());
        assert!(generator.is_new_model(&model(2.1, 5.0), &table).unwrap());
    }

    #[test]
    fn duplicates_within_one_round_are_added_once() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator = ParameterGenerator::with_strategy(
            space.clone(),
            GeneratorSettings::new(),
            Box::new(FixedProposals(vec![
                model(2.0, 4.0),
                model(2.0, 4.0),
                model(2.0, 6.0),
            ])),
        )
        .unwrap();

        let status = generator.generate(Some(&mut table)).unwrap();
        assert_eq!(status.n_new_models, 2);
        assert_eq!(parameter_rows(&table), vec![vec![2.0, 4.0], vec![2.0, 6.0]]);
    }

    #[test]
    fn invalid_candidate_aborts_without_writes() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let short = Model::new(vec![Parameter::fixed("A", 2.0)]);
        let mut generator = ParameterGenerator::with_strategy(
            space.clone(),
            GeneratorSettings::new(),
            Box::new(FixedProposals(vec![model(2.0, 4.0), short])),
        )
        .unwrap();

        let err = generator.generate(Some(&mut table)).unwrap_err();
        assert!(matches!(
            err,
            DmError::Generator(GeneratorError::InvalidModel { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn misnamed_candidate_is_invalid() {
        let space = ab_space();
        let table = AllModels::new(&space);
        let generator = grid_generator(&space, GeneratorSettings::new());
        let swapped = Model::new(vec![Parameter::fixed("B", 5.0), Parameter::fixed("A", 2.0)]);
        assert!(generator.is_new_model(&swapped, &table).is_err());
    }

    #[test]
    fn missing_table_is_an_error() {
        let mut generator = grid_generator(&ab_space(), GeneratorSettings::new());
        let err = generator.generate(None).unwrap_err();
        assert!(matches!(
            err,
            DmError::Generator(GeneratorError::MissingCollaborator { .. })
        ));
    }

    #[test]
    fn table_without_fit_columns_is_rejected() {
        let space = ab_space();
        let mut table = AllModels::with_fit_columns(&space, "chi2", "kchi2");
        let mut generator = grid_generator(&space, GeneratorSettings::new());
        let err = generator.generate(Some(&mut table)).unwrap_err();
        assert!(err.to_string().contains("kinchi2"));
    }

    #[test]
    fn model_compare_checks_names_and_values() {
        let generator = grid_generator(&ab_space(), GeneratorSettings::new());
        assert!(generator.model_compare(&model(2.0, 5.0), &model(2.0, 5.0 + 1e-14)));
        assert!(!generator.model_compare(&model(2.0, 5.0), &model(2.0, 5.5)));
        let renamed = Model::new(vec![Parameter::fixed("A", 2.0), Parameter::fixed("C", 5.0)]);
        assert!(!generator.model_compare(&model(2.0, 5.0), &renamed));
    }

    #[test]
    fn emulator_stops_immediately() {
        let space = ab_space();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(
            &space,
            GeneratorSettings::new().with_generator(GeneratorKind::GaussianProcessEmulator),
        );

        let status = generator.generate(Some(&mut table)).unwrap();
        assert!(status.stop);
        assert_eq!(status.criterion(GPE_EXHAUSTED), Some(true));
        assert_eq!(status.n_new_models, 0);
        assert!(table.is_empty());
    }

    #[test]
    fn space_from_system_drives_generation() {
        let system = System::new()
            .add_component(
                Component::new("bh", ComponentKind::Plummer, true)
                    .with_parameter(Parameter::fixed("a", 0.001))
                    .with_parameter(Parameter::free(
                        "m",
                        4.0,
                        GridSettings::new(2.0, 6.0, 1.0),
                    )),
            )
            .add_parameter(Parameter::free("ml", 1.0, GridSettings::new(1.0, 3.0, 1.0)));
        let space = ParameterSpace::new(&system).unwrap();
        let mut table = AllModels::new(&space);
        let mut generator = grid_generator(&space, GeneratorSettings::new());

        generator.generate(Some(&mut table)).unwrap();
        let status = generator.generate(Some(&mut table)).unwrap();

        // m in {3, 4, 5}, ml in {1, 2}: six combinations, one already present
        assert_eq!(status.n_new_models, 5);
        assert_eq!(table.len(), 6);
    }
}
