//! Client side of the backend platform.
//!
//! [`app`] keeps the registry of initialized apps, [`analytics`] attaches the
//! telemetry component to an app. Both hand out cheap clonable handles.

pub mod analytics;
pub mod app;
pub mod error;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use analytics::{
    get_analytics, initialize_analytics, initialize_analytics_with, Analytics, AnalyticsError,
    AnalyticsEvent, DispatchError, Dispatcher, EventBatch, MeasurementProtocolDispatcher,
    MemoryDispatcher, UnsupportedReason,
};
pub use app::{delete_app, get_app, get_apps, initialize_app, App, AppRegistry};
pub use error::AppError;

/// Version reported by this client library.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Registry state stays usable after a panicking holder.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
