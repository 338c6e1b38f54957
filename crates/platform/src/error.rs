use ember_kernel::ConfigError;
use thiserror::Error;

/// Failures raised while creating or looking up apps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid app options: {0}")]
    InvalidOptions(#[from] ConfigError),

    #[error("app name must not be blank")]
    InvalidAppName,

    #[error("app '{name}' already exists with different options or settings")]
    DuplicateApp { name: String },

    #[error("no app named '{name}' has been initialized")]
    NoApp { name: String },

    #[error("app '{name}' has been deleted")]
    AppDeleted { name: String },
}
