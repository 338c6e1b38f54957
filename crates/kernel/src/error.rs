use thiserror::Error;

/// Startup configuration failures. Each variant names the offending key so the
/// operator can fix the source without reading a backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration field '{field}'")]
    MissingField { field: &'static str },

    #[error("invalid configuration field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unsupported environment '{0}'; expected local/staging/production")]
    UnsupportedEnvironment(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// The configuration key this error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            Self::UnsupportedEnvironment(_) => None,
        }
    }
}
