//! The physical system handed over by the configuration layer.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ParameterError;
use crate::parameter::Parameter;

/// Known model component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Point-like central mass, e.g. a black hole.
    Plummer,
    /// Stellar component with observed kinematics.
    VisibleComponent,
    /// Navarro-Frenk-White dark matter halo.
    #[serde(rename = "NFW")]
    Nfw,
}

impl ComponentKind {
    const REGISTRY: &'static [(&'static str, ComponentKind)] = &[
        ("Plummer", ComponentKind::Plummer),
        ("VisibleComponent", ComponentKind::VisibleComponent),
        ("NFW", ComponentKind::Nfw),
    ];

    /// Resolve a configuration type name against the component registry.
    pub fn from_type_name(type_name: &str) -> Result<Self, ParameterError> {
        Self::REGISTRY
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ParameterError::UnknownComponentType {
                type_name: type_name.to_string(),
                known: Self::REGISTRY.iter().map(|(n, _)| n.to_string()).collect(),
            })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Plummer => "Plummer",
            Self::VisibleComponent => "VisibleComponent",
            Self::Nfw => "NFW",
        }
    }
}

impl FromStr for ComponentKind {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_type_name(s)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One model component and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub contributes_to_potential: bool,
    pub parameters: Vec<Parameter>,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind, contributes_to_potential: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            contributes_to_potential,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Ordered components plus system-level (global) parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub components: Vec<Component>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn add_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}
