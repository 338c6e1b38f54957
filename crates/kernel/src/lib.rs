//! Settings loading and the client configuration record.

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    AnalyticsSettings, AppSettings, Environment, FirebaseSettings, LogFormat, Settings,
    TelemetrySettings, DEFAULT_APP_NAME,
};
