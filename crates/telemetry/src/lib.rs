//! Logging bootstrap shared by the binaries.

use anyhow::anyhow;
use ember_kernel::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber, writing to stderr so command
/// output on stdout stays clean.
///
/// `RUST_LOG` wins when set; otherwise `telemetry.log_level` is used. Fails
/// if a subscriber is already installed.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match settings.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    result.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::debug!(
        target: "ember-telemetry",
        format = ?settings.log_format,
        "logging initialized"
    );
    Ok(())
}

fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.log_level)
        .map_err(|err| anyhow!("invalid telemetry.log_level '{}': {err}", settings.log_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_builds_a_filter() {
        let settings = TelemetrySettings {
            log_level: "ember_platform=debug,info".to_string(),
            ..TelemetrySettings::default()
        };
        if std::env::var_os("RUST_LOG").is_none() {
            let filter = env_filter(&settings).unwrap();
            assert!(filter.to_string().contains("ember_platform=debug"));
        }
    }

    #[test]
    fn garbage_level_is_rejected() {
        let settings = TelemetrySettings {
            log_level: "ember=loud".to_string(),
            ..TelemetrySettings::default()
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(env_filter(&settings).is_err());
        }
    }
}
