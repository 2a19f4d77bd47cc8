//! The ordered parameter space of a system.

use serde::Serialize;
use std::collections::HashSet;

use crate::errors::ParameterError;
use crate::model::Model;
use crate::parameter::Parameter;
use crate::system::System;

/// All parameters of a system in canonical column order.
///
/// Component parameters come first, in component order, followed by the
/// system-level parameters. The space cannot be modified once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpace {
    parameters: Vec<Parameter>,
    par_names: Vec<String>,
    n_par: usize,
    n_par_fixed: usize,
    n_par_free: usize,
}

impl ParameterSpace {
    pub fn new(system: &System) -> Result<Self, ParameterError> {
        let parameters = system
            .components
            .iter()
            .flat_map(|component| component.parameters.iter())
            .chain(system.parameters.iter())
            .cloned()
            .collect();
        Self::from_parameters(parameters)
    }

    pub fn from_parameters(parameters: Vec<Parameter>) -> Result<Self, ParameterError> {
        let mut seen = HashSet::new();
        for par in &parameters {
            par.validate()?;
            if !seen.insert(par.name.as_str()) {
                return Err(ParameterError::DuplicateParameter {
                    name: par.name.clone(),
                });
            }
        }

        let par_names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
        let n_par = parameters.len();
        let n_par_fixed = parameters.iter().filter(|p| p.fixed).count();

        Ok(Self {
            parameters,
            par_names,
            n_par,
            n_par_fixed,
            n_par_free: n_par - n_par_fixed,
        })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.par_names.iter().position(|n| n == name)
    }

    pub fn par_names(&self) -> &[String] {
        &self.par_names
    }

    pub fn len(&self) -> usize {
        self.n_par
    }

    pub fn is_empty(&self) -> bool {
        self.n_par == 0
    }

    pub fn n_par_fixed(&self) -> usize {
        self.n_par_fixed
    }

    pub fn n_par_free(&self) -> usize {
        self.n_par_free
    }

    /// The model with every parameter at its configured value.
    pub fn initial_model(&self) -> Model {
        Model::new(self.parameters.clone())
    }
}

impl<'a> IntoIterator for &'a ParameterSpace {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}
