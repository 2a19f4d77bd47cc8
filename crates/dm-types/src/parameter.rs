//! Search parameters and their grid settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ParameterError;

/// Grid-walk settings for a free parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSettings {
    pub lo: f64,
    pub hi: f64,
    pub step: f64,
    /// Smallest refinement distance; `step` is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minstep: Option<f64>,
}

impl GridSettings {
    pub fn new(lo: f64, hi: f64, step: f64) -> Self {
        Self {
            lo,
            hi,
            step,
            minstep: None,
        }
    }

    pub fn with_minstep(mut self, minstep: f64) -> Self {
        self.minstep = Some(minstep);
        self
    }

    pub fn effective_minstep(&self) -> f64 {
        self.minstep.unwrap_or(self.step)
    }
}

/// A single named scalar search variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub latex: Option<String>,
    /// printf-style display format, e.g. `%g` or `%.3f`.
    #[serde(default = "default_sformat")]
    pub sformat: String,
    pub value: f64,
    #[serde(default)]
    pub grid_parspace_settings: Option<GridSettings>,
    /// Opaque settings block reserved for the Gaussian process emulator.
    #[serde(default)]
    pub gpe_parspace_settings: Option<Value>,
}

fn default_sformat() -> String {
    "%g".to_string()
}

impl Parameter {
    /// The attribute schema shared by every parameter.
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "desc",
        "fixed",
        "latex",
        "sformat",
        "value",
        "grid_parspace_settings",
        "gpe_parspace_settings",
    ];

    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            fixed: false,
            latex: None,
            sformat: default_sformat(),
            value,
            grid_parspace_settings: None,
            gpe_parspace_settings: None,
        }
    }

    /// A fixed parameter pinned at `value`.
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            fixed: true,
            ..Self::new(name, value)
        }
    }

    /// A free parameter walked on the grid `[lo, hi]` with the given step.
    pub fn free(name: impl Into<String>, value: f64, grid: GridSettings) -> Self {
        Self {
            grid_parspace_settings: Some(grid),
            ..Self::new(name, value)
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_latex(mut self, latex: impl Into<String>) -> Self {
        self.latex = Some(latex.into());
        self
    }

    pub fn with_sformat(mut self, sformat: impl Into<String>) -> Self {
        self.sformat = sformat.into();
        self
    }

    fn allowed_keys() -> Vec<String> {
        Self::FIELDS.iter().map(|f| f.to_string()).collect()
    }

    /// Set whitelisted attributes from a JSON object.
    ///
    /// Every key is checked against [`Parameter::FIELDS`] before anything is
    /// written; on error the parameter is left untouched.
    pub fn update(&mut self, fields: &Map<String, Value>) -> Result<(), ParameterError> {
        if let Some(key) = fields
            .keys()
            .find(|key| !Self::FIELDS.contains(&key.as_str()))
        {
            return Err(ParameterError::InvalidParameterKey {
                key: key.clone(),
                allowed: Self::allowed_keys(),
            });
        }

        let field_list = || fields.keys().cloned().collect::<Vec<_>>().join(", ");

        let mut current =
            serde_json::to_value(&*self).map_err(|e| ParameterError::InvalidParameterValue {
                field: field_list(),
                message: e.to_string(),
            })?;
        if let Value::Object(map) = &mut current {
            for (key, value) in fields {
                map.insert(key.clone(), value.clone());
            }
        }

        let updated: Parameter =
            serde_json::from_value(current).map_err(|e| ParameterError::InvalidParameterValue {
                field: field_list(),
                message: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }

    /// Check that the parameter still satisfies its declared invariants.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let invalid = |message: String| ParameterError::Invalid {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if !self.value.is_finite() {
            return Err(invalid(format!("value {} is not finite", self.value)));
        }
        if self.fixed {
            return Ok(());
        }

        let grid = self
            .grid_parspace_settings
            .as_ref()
            .ok_or_else(|| invalid("free parameter needs grid_parspace_settings".to_string()))?;
        if !(grid.lo.is_finite() && grid.hi.is_finite()) {
            return Err(invalid(format!(
                "bounds must be finite, got lo={} hi={}",
                grid.lo, grid.hi
            )));
        }
        if grid.lo > grid.hi {
            return Err(invalid(format!(
                "lo={} is greater than hi={}",
                grid.lo, grid.hi
            )));
        }
        if !(grid.step.is_finite() && grid.step > 0.0) {
            return Err(invalid(format!("step must be positive, got {}", grid.step)));
        }
        if let Some(minstep) = grid.minstep {
            if !(minstep.is_finite() && minstep >= 0.0) {
                return Err(invalid(format!(
                    "minstep must be non-negative, got {minstep}"
                )));
            }
        }
        Ok(())
    }

    /// Render the current value with the parameter's display format.
    pub fn formatted_value(&self) -> String {
        format_value(&self.sformat, self.value)
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.formatted_value())
    }
}

/// Supports `%g`, `%.Ng`, `%.Nf`, `%.Ne` and `%d`; anything else renders as `%g`.
fn format_value(sformat: &str, value: f64) -> String {
    let pattern = sformat.trim().trim_start_matches('%');
    let (body, conversion) = match pattern.char_indices().last() {
        Some((idx, c)) => (&pattern[..idx], c),
        None => return format_general(value, 6),
    };
    let precision = body
        .strip_prefix('.')
        .and_then(|p| p.parse::<usize>().ok());

    match conversion {
        'f' => format!("{:.*}", precision.unwrap_or(6), value),
        'e' => format!("{:.*e}", precision.unwrap_or(6), value),
        'd' | 'i' => format!("{}", value.round() as i64),
        _ => format_general(value, precision.unwrap_or(6)),
    }
}

fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    }
}
