use thiserror::Error;

/// A configuration value that cannot be used to build a simulation.
///
/// `field` is a dotted path into the configuration (for example
/// `species[1].ks`) so that the offending entry can be located directly.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid configuration `{field}`: {reason}")]
pub struct ConfigError {
    pub field: String,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Prefixes the field path, used when a sub-configuration is validated
    /// on behalf of an enclosing one.
    #[must_use]
    pub fn within(mut self, parent: &str) -> Self {
        self.field = format!("{parent}.{}", self.field);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("state has {actual} components, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("step size must be finite and positive, got {0}")]
    InvalidStep(f64),
    #[error("component {index} became non-finite ({value})")]
    NonFinite { index: usize, value: f64 },
    #[error("sub-step {substep}: {source}")]
    AtSubstep {
        substep: usize,
        #[source]
        source: Box<IntegrationError>,
    },
}

impl IntegrationError {
    /// Index of the sub-step that failed, when the error came from a
    /// multi-step span.
    #[must_use]
    pub fn substep(&self) -> Option<usize> {
        match self {
            IntegrationError::AtSubstep { substep, .. } => Some(*substep),
            _ => None,
        }
    }
}

/// Checks that `value` is finite and strictly positive.
pub fn require_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::new(field, format!("must be finite and > 0, got {value}")))
    }
}

/// Checks that `value` is finite and not negative.
pub fn require_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::new(field, format!("must be finite and >= 0, got {value}")))
    }
}

pub fn require_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::new(field, format!("must be finite, got {value}")))
    }
}
