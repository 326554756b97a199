use crate::global_variables::*;
use std::fmt;

/// Rejected solver or case configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterError {
    ZeroIterations(&'static str),
    NonPositiveTolerance(Float),
    InvalidSorFactor(Float),
    ZeroLevels,
    TooManyLevels { requested: usize, max: usize },
    InvalidResolution(Vec<usize>),
    MissingKey(String),
    InvalidValue { key: String, value: String },
    UnknownSolver(String),
    UnknownBoundaryScheme(String),
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::ZeroIterations(name) => {
                write!(f, "the number of {name} must be greater than zero")
            }
            ParameterError::NonPositiveTolerance(tolerance) => {
                write!(f, "the tolerance {tolerance} must be positive and finite")
            }
            ParameterError::InvalidSorFactor(factor) => {
                write!(f, "the SOR factor {factor} must lie in (0, 2)")
            }
            ParameterError::ZeroLevels => {
                write!(f, "the multigrid hierarchy needs at least one level")
            }
            ParameterError::TooManyLevels { requested, max } => {
                write!(f, "{requested} multigrid levels requested, at most {max} allowed")
            }
            ParameterError::InvalidResolution(resolution) => {
                write!(f, "invalid grid resolution {resolution:?}")
            }
            ParameterError::MissingKey(key) => write!(f, "the key \"{key}\" is missing"),
            ParameterError::InvalidValue { key, value } => {
                write!(f, "invalid value \"{value}\" for the key \"{key}\"")
            }
            ParameterError::UnknownSolver(name) => write!(f, "unknown linear solver \"{name}\""),
            ParameterError::UnknownBoundaryScheme(name) => {
                write!(f, "unknown boundary scheme \"{name}\"")
            }
        }
    }
}

impl std::error::Error for ParameterError {}

/// Parses `parameters[key]` when present, falling back to `default`.
pub(crate) fn parse_or<T: std::str::FromStr>(
    parameters: &std::collections::HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ParameterError> {
    match parameters.get(key) {
        Some(value) => value.parse::<T>().map_err(|_| ParameterError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

/// Parses `parameters[key]`, which must be present.
pub(crate) fn parse_required<T: std::str::FromStr>(
    parameters: &std::collections::HashMap<String, String>,
    key: &str,
) -> Result<T, ParameterError> {
    let value = parameters
        .get(key)
        .ok_or_else(|| ParameterError::MissingKey(key.to_string()))?;
    value.parse::<T>().map_err(|_| ParameterError::InvalidValue {
        key: key.to_string(),
        value: value.clone(),
    })
}
