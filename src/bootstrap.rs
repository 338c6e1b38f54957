use std::sync::Arc;

use anyhow::Context;
use ember_kernel::{AnalyticsSettings, Settings};
use ember_platform::{
    initialize_analytics, initialize_analytics_with, Analytics, AnalyticsError, App, AppError,
    AppRegistry, Dispatcher,
};

use crate::context::{AnalyticsStatus, AppContext};

/// Create the platform app described by `settings` in `registry`.
pub fn initialize(settings: &Settings, registry: &AppRegistry) -> Result<App, AppError> {
    registry.initialize_app(settings.firebase.clone(), settings.app.clone())
}

/// Attach analytics to `app` using the transport named in `settings`.
pub fn initialize_telemetry(
    app: &App,
    settings: &AnalyticsSettings,
) -> Result<Analytics, AnalyticsError> {
    initialize_analytics(app, settings)
}

/// Initialize against the process-wide registry.
pub fn bootstrap(settings: Settings) -> anyhow::Result<AppContext> {
    Bootstrap::new().run(settings)
}

/// Startup sequence with overridable registry and analytics transport.
pub struct Bootstrap<'a> {
    registry: &'a AppRegistry,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl Bootstrap<'static> {
    pub fn new() -> Self {
        Self {
            registry: AppRegistry::global(),
            dispatcher: None,
        }
    }
}

impl Default for Bootstrap<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Bootstrap<'a> {
    pub fn with_registry(registry: &'a AppRegistry) -> Self {
        Self {
            registry,
            dispatcher: None,
        }
    }

    /// Deliver analytics through `dispatcher` instead of the configured one.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// App failures always abort. Analytics failures abort only when
    /// `analytics.required` is set; otherwise the context records why
    /// analytics is unavailable.
    pub fn run(self, settings: Settings) -> anyhow::Result<AppContext> {
        let settings = Arc::new(settings);

        let app = initialize(&settings, self.registry)
            .with_context(|| format!("failed to initialize app '{}'", settings.app.name))?;

        let analytics = match &self.dispatcher {
            Some(dispatcher) => {
                initialize_analytics_with(&app, &settings.analytics, dispatcher.clone())
            }
            None => initialize_telemetry(&app, &settings.analytics),
        };

        let analytics = match analytics {
            Ok(analytics) => AnalyticsStatus::Enabled(analytics),
            Err(err) if !settings.analytics.required => {
                tracing::warn!(
                    app = %app.name(),
                    unsupported = err.is_unsupported(),
                    error = %err,
                    "analytics unavailable, continuing without it"
                );
                AnalyticsStatus::Unavailable {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to initialize analytics for '{}'", app.name())));
            }
        };

        tracing::info!(
            app = %app.name(),
            project_id = %app.options().project_id,
            analytics = %analytics,
            "bootstrap complete"
        );

        Ok(AppContext::new(settings, app, analytics))
    }
}
