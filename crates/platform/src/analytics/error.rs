use std::fmt;

use thiserror::Error;

use super::transport::DispatchError;

/// Why analytics cannot run for an app in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedReason {
    Disabled,
    MissingMeasurementId,
    NoTransport,
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            UnsupportedReason::Disabled => "analytics is disabled in settings",
            UnsupportedReason::MissingMeasurementId => "the app has no measurement_id",
            UnsupportedReason::NoTransport => {
                "no browser runtime and no measurement protocol api_secret configured"
            }
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics unsupported in this environment: {0}")]
    Unsupported(UnsupportedReason),

    #[error("analytics already initialized for app '{app}' with different settings")]
    AlreadyInitialized { app: String },

    #[error("app '{app}' has been deleted")]
    AppDeleted { app: String },

    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    #[error("event queue is full ({capacity} events)")]
    QueueFull { capacity: usize },

    #[error("failed to dispatch analytics batch: {0}")]
    Dispatch(#[from] DispatchError),
}

impl AnalyticsError {
    /// True when the environment cannot host analytics, as opposed to a hard
    /// failure. Callers that treat analytics as optional branch on this.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AnalyticsError::Unsupported(_))
    }

    pub(crate) fn invalid_event(reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidEvent {
            reason: reason.into(),
        }
    }
}
