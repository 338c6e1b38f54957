//! Ember application library.
//!
//! Loads the client configuration, initializes the platform app and its
//! analytics component, and hands both out through an [`AppContext`].

pub mod bootstrap;
pub mod context;

pub use bootstrap::{bootstrap, initialize, initialize_telemetry, Bootstrap};
pub use context::{AnalyticsStatus, AppContext};
