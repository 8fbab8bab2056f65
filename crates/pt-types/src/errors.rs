use thiserror::Error;

/// Main error type for the ParamTune system
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while building or checking the parameter domain.
///
/// All of these are fatal at load time, before any search starts.
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Malformed parameter line {line}: {message}")]
    MalformedLine { line: usize, message: String },

    #[error("Parameter {name} has {size} values, at least 2 are required")]
    DomainTooSmall { name: String, size: usize },

    #[error("Default value {default} of parameter {name} is not in its domain")]
    DefaultOutsideDomain { name: String, default: String },

    #[error("Parameter {name} mixes boolean and integer values")]
    MixedValueTypes { name: String },

    #[error("Parameter {name} lists value {value} more than once")]
    DuplicateValue { name: String, value: String },

    #[error("Parameter {name} is declared more than once")]
    DuplicateParameter { name: String },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Value {value} is not admissible for parameter {name}")]
    ValueOutsideDomain { name: String, value: String },

    #[error("Point has {actual} values but the space has {expected} parameters")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Parameter space is empty")]
    EmptySpace,
}

/// Violations of the external program's output contract.
///
/// The objective cannot be trusted once one of these occurs, so they abort the run.
#[derive(Error, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("No runtime line found in output of: {command}")]
    MissingRuntime { command: String },

    #[error("Unparseable runtime line '{line}'")]
    UnparseableRuntime { line: String },

    #[error("Non-positive runtime {runtime} reported by: {command}")]
    NonPositiveRuntime { runtime: f64, command: String },

    #[error("Instance {instance} reported unsatisfiable, but benchmarks are assumed satisfiable")]
    UnexpectedUnsatisfiable { instance: String },

    #[error("Failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },
}

/// Errors surfaced by the search engine itself.
#[derive(Error, Debug, PartialEq)]
pub enum SearchError {
    #[error("Benchmark set is empty")]
    NoInstances,

    #[error("Invalid search configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias for ParamTune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config(format!($($arg)*))
    };
}
