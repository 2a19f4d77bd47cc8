//! Candidate models and the tolerance used to compare them.

use serde::{Deserialize, Serialize};

use crate::parameter::Parameter;

/// Numerical tolerance for parameter-value equality.
///
/// Two values are equal when `|a - b| <= max(atol, rtol * max(|a|, |b|))`.
/// The test is symmetric in `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-12,
        }
    }
}

impl Tolerance {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    pub fn is_close(&self, a: f64, b: f64) -> bool {
        let scale = a.abs().max(b.abs());
        (a - b).abs() <= self.atol.max(self.rtol * scale)
    }

    /// Element-wise [`Tolerance::is_close`]; slices of different length never match.
    pub fn all_close(&self, a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.is_close(*x, *y))
    }
}

/// One full parameter combination proposed for evaluation.
///
/// Holds a snapshot of every parameter in parameter-space order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    parameters: Vec<Parameter>,
}

impl Model {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// The flattened row values in parameter order.
    pub fn values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.value).collect()
    }

    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }

    /// A new model with `parameter` appended; `self` is left unchanged.
    pub fn extended(&self, parameter: Parameter) -> Self {
        let mut parameters = Vec::with_capacity(self.parameters.len() + 1);
        parameters.extend(self.parameters.iter().cloned());
        parameters.push(parameter);
        Self { parameters }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, par) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{par}")?;
        }
        write!(f, "]")
    }
}
