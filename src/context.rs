use std::fmt;
use std::sync::Arc;

use ember_kernel::Settings;
use ember_platform::{Analytics, App};

/// Outcome of analytics setup carried alongside the app.
#[derive(Debug, Clone)]
pub enum AnalyticsStatus {
    Enabled(Analytics),
    Unavailable { reason: String },
}

impl fmt::Display for AnalyticsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsStatus::Enabled(analytics) => {
                write!(f, "enabled ({})", analytics.measurement_id())
            }
            AnalyticsStatus::Unavailable { reason } => write!(f, "unavailable: {reason}"),
        }
    }
}

/// Handles produced at startup, passed to whatever needs them.
///
/// Cloning is cheap and every clone refers to the same app and analytics
/// instances.
#[derive(Debug, Clone)]
pub struct AppContext {
    settings: Arc<Settings>,
    app: App,
    analytics: AnalyticsStatus,
}

impl AppContext {
    pub fn new(settings: Arc<Settings>, app: App, analytics: AnalyticsStatus) -> Self {
        Self {
            settings,
            app,
            analytics,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn analytics(&self) -> Option<&Analytics> {
        match &self.analytics {
            AnalyticsStatus::Enabled(analytics) => Some(analytics),
            AnalyticsStatus::Unavailable { .. } => None,
        }
    }

    pub fn analytics_status(&self) -> &AnalyticsStatus {
        &self.analytics
    }
}
