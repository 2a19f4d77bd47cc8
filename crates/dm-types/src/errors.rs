use thiserror::Error;

/// Main error type for the model search engine
#[derive(Error, Debug)]
pub enum DmError {
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Parameter and parameter-space errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Invalid parameter key {key}. Allowed keys: {}", .allowed.join(", "))]
    InvalidParameterKey { key: String, allowed: Vec<String> },

    #[error("Invalid value for parameter field {field}: {message}")]
    InvalidParameterValue { field: String, message: String },

    #[error("Invalid parameter {name}: {message}")]
    Invalid { name: String, message: String },

    #[error("Duplicate parameter name: {name}")]
    DuplicateParameter { name: String },

    #[error("Unknown component type: {type_name}. Known types: {}", .known.join(", "))]
    UnknownComponentType { type_name: String, known: Vec<String> },
}

/// Errors raised while generating new models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Missing collaborator: {what}")]
    MissingCollaborator { what: String },

    #[error("Model table is missing required column: {column}")]
    TableSchema { column: String },

    #[error("Missing center: grid walk needs {expected} center coordinates, got {actual}")]
    MissingCenter { expected: usize, actual: usize },

    #[error(
        "Inconsistent fixed parameter {name}: configured value {configured}, center value {center}"
    )]
    InconsistentFixedParameter {
        name: String,
        configured: f64,
        center: f64,
    },

    #[error("Invalid range: minimum {lo} is greater than maximum {hi}")]
    InvalidRange { lo: f64, hi: f64 },

    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error("Model table error: {message}")]
    Table { message: String },
}

/// Result type alias for model search operations
pub type DmResult<T> = Result<T, DmError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::DmError::Config(format!($($arg)*))
    };
}
