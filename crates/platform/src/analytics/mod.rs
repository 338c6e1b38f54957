mod api;
mod error;
mod event;
mod transport;

pub use api::{
    get_analytics, initialize_analytics, initialize_analytics_with, Analytics, MAX_BATCH_EVENTS,
};
pub use error::{AnalyticsError, UnsupportedReason};
pub use event::{AnalyticsEvent, MAX_EVENT_NAME_LEN, MAX_EVENT_PARAMS, MAX_PARAM_VALUE_LEN};
pub use transport::{
    DispatchError, Dispatcher, EventBatch, MeasurementProtocolDispatcher, MemoryDispatcher,
};
