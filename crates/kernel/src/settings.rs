use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "EMBER_ENV";
const CONFIG_DIR_ENV: &str = "EMBER_CONFIG_DIR";
const ENV_PREFIX: &str = "EMBER";

/// Name given to the app when the configuration does not pick one.
pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(ConfigError::UnsupportedEnvironment(other.to_string())),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub firebase: FirebaseSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay and
    /// `EMBER_*` variables, then validate it.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(None, None)
    }

    /// [`Settings::load`] with explicit overrides for the config directory and
    /// environment name; `None` falls back to `EMBER_CONFIG_DIR`/`EMBER_ENV`.
    pub fn load_with(
        config_dir: Option<PathBuf>,
        environment: Option<String>,
    ) -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = environment
            .or_else(|| std::env::var(ENV_VAR_NAME).ok())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let config_dir =
            config_dir.or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from));
        let config_dir = match config_dir {
            Some(dir) => dir,
            // Default to repo root `config` directory.
            None => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Same layering as [`Settings::load`] with an explicit directory and
    /// environment name. `.env` is not read here.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment.as_str()));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = environment;
        settings.validate()?;

        tracing::debug!(
            env = environment.as_str(),
            dir = %config_dir.display(),
            project_id = %settings.firebase.project_id,
            "configuration loaded"
        );

        Ok(settings)
    }

    /// Check every section; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.app.validate()?;
        self.firebase.validate()?;
        self.analytics.validate()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    #[serde(default = "AppSettings::default_name")]
    pub name: String,
    #[serde(default = "AppSettings::default_automatic_data_collection")]
    pub automatic_data_collection_enabled: bool,
}

impl AppSettings {
    fn default_name() -> String {
        DEFAULT_APP_NAME.to_string()
    }

    fn default_automatic_data_collection() -> bool {
        true
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "app.name" });
        }
        Ok(())
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            automatic_data_collection_enabled: Self::default_automatic_data_collection(),
        }
    }
}

/// Identifiers of the backend project this client talks to.
///
/// The record is read once at startup and never changes afterwards. The API
/// key is a public client identifier for this kind of platform, but it is
/// still kept out of `Debug` output and logs.
#[derive(Clone, Deserialize, PartialEq, Eq, Default)]
pub struct FirebaseSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub measurement_id: Option<String>,
}

impl FirebaseSettings {
    /// API key with everything past the first four characters masked.
    pub fn redacted_api_key(&self) -> String {
        redact(&self.api_key)
    }

    /// Measurement id with blank values treated as absent.
    pub fn measurement_id(&self) -> Option<&str> {
        self.measurement_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Fail on the first missing or malformed field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("api_key", &self.api_key),
            ("auth_domain", &self.auth_domain),
            ("project_id", &self.project_id),
            ("storage_bucket", &self.storage_bucket),
            ("messaging_sender_id", &self.messaging_sender_id),
            ("app_id", &self.app_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { field });
            }
        }

        if self.auth_domain.contains("://")
            || self.auth_domain.contains('/')
            || self.auth_domain.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::invalid(
                "auth_domain",
                "expected a bare host name such as 'project.firebaseapp.com'",
            ));
        }

        if !self.messaging_sender_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::invalid(
                "messaging_sender_id",
                "expected a numeric sender id",
            ));
        }

        let segments: Vec<&str> = self.app_id.split(':').collect();
        if segments.len() < 4 || segments.iter().any(|segment| segment.is_empty()) {
            return Err(ConfigError::invalid(
                "app_id",
                "expected '<version>:<project number>:<platform>:<hash>'",
            ));
        }
        if segments[1] != self.messaging_sender_id {
            return Err(ConfigError::invalid(
                "app_id",
                format!(
                    "project number '{}' does not match messaging_sender_id",
                    segments[1]
                ),
            ));
        }

        if let Some(id) = self.measurement_id() {
            if !id.starts_with("G-") || id.len() == 2 {
                return Err(ConfigError::invalid(
                    "measurement_id",
                    "expected a 'G-' prefixed stream id",
                ));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for FirebaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseSettings")
            .field("api_key", &self.redacted_api_key())
            .field("auth_domain", &self.auth_domain)
            .field("project_id", &self.project_id)
            .field("storage_bucket", &self.storage_bucket)
            .field("messaging_sender_id", &self.messaging_sender_id)
            .field("app_id", &self.app_id)
            .field("measurement_id", &self.measurement_id)
            .finish()
    }
}

#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct AnalyticsSettings {
    #[serde(default = "AnalyticsSettings::default_enabled")]
    pub enabled: bool,
    /// When false, an analytics failure at startup is logged and skipped.
    #[serde(default)]
    pub required: bool,
    /// Measurement Protocol secret; enables server-side event delivery.
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "AnalyticsSettings::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "AnalyticsSettings::default_max_queue")]
    pub max_queue: usize,
}

impl AnalyticsSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_endpoint() -> String {
        "https://www.google-analytics.com/mp/collect".to_string()
    }

    fn default_max_queue() -> usize {
        500
    }

    pub fn api_secret(&self) -> Option<&str> {
        self.api_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue == 0 {
            return Err(ConfigError::invalid(
                "analytics.max_queue",
                "must be greater than zero",
            ));
        }
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(ConfigError::invalid(
                "analytics.endpoint",
                "expected an http(s) URL",
            ));
        }
        Ok(())
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            required: false,
            api_secret: None,
            endpoint: Self::default_endpoint(),
            max_queue: Self::default_max_queue(),
        }
    }
}

impl fmt::Debug for AnalyticsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsSettings")
            .field("enabled", &self.enabled)
            .field("required", &self.required)
            .field("api_secret", &self.api_secret.as_deref().map(redact))
            .field("endpoint", &self.endpoint)
            .field("max_queue", &self.max_queue)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn redact(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        let visible: String = value.chars().take(4).collect();
        format!("{visible}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FirebaseSettings {
        FirebaseSettings {
            api_key: "AIzaSyTestKey0000000000000000000000000".to_string(),
            auth_domain: "lockers-test.firebaseapp.com".to_string(),
            project_id: "lockers-test".to_string(),
            storage_bucket: "lockers-test.firebasestorage.app".to_string(),
            messaging_sender_id: "123456789012".to_string(),
            app_id: "1:123456789012:web:abcdef0123456789".to_string(),
            measurement_id: Some("G-TEST12345".to_string()),
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    const BASE: &str = r#"
[firebase]
api_key = "AIzaSyTestKey0000000000000000000000000"
auth_domain = "lockers-test.firebaseapp.com"
project_id = "lockers-test"
storage_bucket = "lockers-test.firebasestorage.app"
messaging_sender_id = "123456789012"
app_id = "1:123456789012:web:abcdef0123456789"
measurement_id = "G-TEST12345"
"#;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
        assert_eq!(settings.app.name, DEFAULT_APP_NAME);
    }

    #[test]
    fn default_settings_fail_on_first_missing_field() {
        let err = Settings::default().validate().unwrap_err();
        assert_eq!(err, ConfigError::MissingField { field: "api_key" });
    }

    #[test]
    fn complete_record_is_valid() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn blank_project_id_is_reported_by_name() {
        let mut record = sample();
        record.project_id = "   ".to_string();
        let err = record.validate().unwrap_err();
        assert_eq!(err.field(), Some("project_id"));
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn auth_domain_must_be_a_host() {
        let mut record = sample();
        record.auth_domain = "https://lockers-test.firebaseapp.com".to_string();
        assert_eq!(record.validate().unwrap_err().field(), Some("auth_domain"));
    }

    #[test]
    fn sender_id_must_be_numeric() {
        let mut record = sample();
        record.messaging_sender_id = "12ab".to_string();
        assert_eq!(
            record.validate().unwrap_err().field(),
            Some("messaging_sender_id")
        );
    }

    #[test]
    fn app_id_must_carry_the_sender_id() {
        let mut record = sample();
        record.app_id = "1:999:web:abcdef".to_string();
        let err = record.validate().unwrap_err();
        assert_eq!(err.field(), Some("app_id"));
        assert!(err.to_string().contains("999"));

        record.app_id = "1:123456789012:web".to_string();
        assert_eq!(record.validate().unwrap_err().field(), Some("app_id"));
    }

    #[test]
    fn measurement_id_is_optional_but_checked_when_present() {
        let mut record = sample();
        record.measurement_id = None;
        assert!(record.validate().is_ok());

        record.measurement_id = Some("  ".to_string());
        assert!(record.validate().is_ok());
        assert_eq!(record.measurement_id(), None);

        record.measurement_id = Some("UA-1234".to_string());
        assert_eq!(
            record.validate().unwrap_err().field(),
            Some("measurement_id")
        );
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("AIzaSyTestKey0000000000000000000000000"));
        assert!(rendered.contains("AIza***"));
        assert!(rendered.contains("lockers-test"));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedEnvironment("qa".to_string()));
    }

    #[test]
    fn load_from_reads_base_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.toml", BASE);

        let settings = Settings::load_from(dir.path(), "local").unwrap();
        assert_eq!(settings.environment, Environment::Local);
        assert_eq!(settings.firebase, sample());
        assert_eq!(settings.analytics, AnalyticsSettings::default());
        assert_eq!(settings.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn environment_overlay_wins_over_base() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.toml", BASE);
        write(
            dir.path(),
            "staging.toml",
            r#"
[app]
name = "staging-client"

[analytics]
required = true
max_queue = 10

[telemetry]
log_format = "json"
"#,
        );

        let settings = Settings::load_from(dir.path(), "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.app.name, "staging-client");
        assert!(settings.analytics.required);
        assert_eq!(settings.analytics.max_queue, 10);
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
        assert_eq!(settings.firebase.project_id, "lockers-test");
    }

    #[test]
    fn load_from_fails_fast_on_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "base.toml",
            &BASE.replace("project_id = \"lockers-test\"", ""),
        );

        let err = Settings::load_from(dir.path(), "local").unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().unwrap();
        assert_eq!(
            config_err,
            &ConfigError::MissingField {
                field: "project_id"
            }
        );
    }

    #[test]
    fn load_from_rejects_unknown_environment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.toml", BASE);

        let err = Settings::load_from(dir.path(), "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    #[test]
    fn zero_queue_is_invalid() {
        let settings = AnalyticsSettings {
            max_queue: 0,
            ..AnalyticsSettings::default()
        };
        assert_eq!(
            settings.validate().unwrap_err().field(),
            Some("analytics.max_queue")
        );
    }
}
