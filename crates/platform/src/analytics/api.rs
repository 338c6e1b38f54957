use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ember_kernel::AnalyticsSettings;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::{AnalyticsError, UnsupportedReason};
use super::event::AnalyticsEvent;
use super::transport::{Dispatcher, EventBatch, MeasurementProtocolDispatcher};
use crate::app::App;
use crate::lock;

/// Most events the collector accepts in one request.
pub const MAX_BATCH_EVENTS: usize = 25;

/// Analytics component bound to one [`App`].
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<AnalyticsInner>,
}

struct AnalyticsInner {
    app: App,
    measurement_id: String,
    client_id: Uuid,
    settings: AnalyticsSettings,
    collection_enabled: AtomicBool,
    user_id: Mutex<Option<String>>,
    default_params: Mutex<Map<String, Value>>,
    queue: Mutex<Vec<AnalyticsEvent>>,
    // Serializes flushes; `queue` is only held long enough to take or restore events.
    flushing: Mutex<()>,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Existing analytics instance for `app`, or a new one with default settings.
pub fn get_analytics(app: &App) -> Result<Analytics, AnalyticsError> {
    if let Some(existing) = lock(app.analytics_slot()).as_ref() {
        return Ok(existing.clone());
    }
    initialize_analytics(app, &AnalyticsSettings::default())
}

/// Create the analytics instance for `app`, picking the transport from
/// `settings`. Without an API secret there is nothing to deliver events
/// through and the call reports [`UnsupportedReason::NoTransport`].
pub fn initialize_analytics(
    app: &App,
    settings: &AnalyticsSettings,
) -> Result<Analytics, AnalyticsError> {
    initialize(app, settings, None)
}

/// Like [`initialize_analytics`] with a caller supplied transport.
pub fn initialize_analytics_with(
    app: &App,
    settings: &AnalyticsSettings,
    dispatcher: Arc<dyn Dispatcher>,
) -> Result<Analytics, AnalyticsError> {
    initialize(app, settings, Some(dispatcher))
}

fn initialize(
    app: &App,
    settings: &AnalyticsSettings,
    dispatcher: Option<Arc<dyn Dispatcher>>,
) -> Result<Analytics, AnalyticsError> {
    let mut slot = lock(app.analytics_slot());
    if app.is_deleted() {
        return Err(AnalyticsError::AppDeleted {
            app: app.name().to_string(),
        });
    }

    if let Some(existing) = slot.as_ref() {
        if existing.settings() == settings {
            return Ok(existing.clone());
        }
        return Err(AnalyticsError::AlreadyInitialized {
            app: app.name().to_string(),
        });
    }

    if !settings.enabled {
        return Err(AnalyticsError::Unsupported(UnsupportedReason::Disabled));
    }
    let measurement_id = app
        .options()
        .measurement_id()
        .ok_or(AnalyticsError::Unsupported(
            UnsupportedReason::MissingMeasurementId,
        ))?
        .to_string();

    let dispatcher = match (dispatcher, settings.api_secret()) {
        (Some(dispatcher), _) => dispatcher,
        (None, Some(secret)) => Arc::new(MeasurementProtocolDispatcher::new(
            settings.endpoint.as_str(),
            measurement_id.as_str(),
            secret,
        )?) as Arc<dyn Dispatcher>,
        (None, None) => {
            return Err(AnalyticsError::Unsupported(UnsupportedReason::NoTransport));
        }
    };

    let analytics = Analytics {
        inner: Arc::new(AnalyticsInner {
            app: app.clone(),
            measurement_id,
            client_id: Uuid::new_v4(),
            settings: settings.clone(),
            collection_enabled: AtomicBool::new(app.automatic_data_collection_enabled()),
            user_id: Mutex::new(None),
            default_params: Mutex::new(Map::new()),
            queue: Mutex::new(Vec::new()),
            flushing: Mutex::new(()),
            dispatcher,
        }),
    };

    tracing::info!(
        app = %app.name(),
        measurement_id = %analytics.measurement_id(),
        collection_enabled = analytics.is_collection_enabled(),
        "analytics initialized"
    );

    *slot = Some(analytics.clone());
    Ok(analytics)
}

impl Analytics {
    pub fn app(&self) -> &App {
        &self.inner.app
    }

    pub fn measurement_id(&self) -> &str {
        &self.inner.measurement_id
    }

    /// Pseudonymous id sent with every batch from this instance.
    pub fn client_id(&self) -> Uuid {
        self.inner.client_id
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.inner.settings
    }

    pub fn is_collection_enabled(&self) -> bool {
        self.inner.collection_enabled.load(Ordering::SeqCst)
    }

    /// Pause or resume collection. Pausing discards the events still queued,
    /// and events logged while paused are dropped.
    pub fn set_analytics_collection_enabled(&self, enabled: bool) {
        self.inner.collection_enabled.store(enabled, Ordering::SeqCst);
        let discarded = if enabled {
            0
        } else {
            std::mem::take(&mut *lock(&self.inner.queue)).len()
        };
        tracing::debug!(
            app = %self.inner.app.name(),
            enabled,
            discarded,
            "analytics collection toggled"
        );
    }

    pub fn user_id(&self) -> Option<String> {
        lock(&self.inner.user_id).clone()
    }

    pub fn set_user_id(&self, user_id: Option<String>) {
        *lock(&self.inner.user_id) = user_id;
    }

    /// Params merged into every later event; event params win on conflict.
    pub fn set_default_event_parameters(&self, params: Map<String, Value>) {
        *lock(&self.inner.default_params) = params;
    }

    /// Number of queued events waiting for [`Analytics::flush`]. Events taken
    /// by a flush that is still dispatching are not counted.
    pub fn pending(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    pub fn log_event(&self, name: &str, params: Map<String, Value>) -> Result<(), AnalyticsError> {
        self.ensure_live()?;

        let mut merged = lock(&self.inner.default_params).clone();
        merged.extend(params);
        let event = AnalyticsEvent::new(name, merged)?;

        if !self.is_collection_enabled() {
            tracing::debug!(event = %event.name, "analytics collection disabled, event dropped");
            return Ok(());
        }

        let mut queue = lock(&self.inner.queue);
        let capacity = self.inner.settings.max_queue;
        if queue.len() >= capacity {
            return Err(AnalyticsError::QueueFull { capacity });
        }
        tracing::trace!(event = %event.name, queued = queue.len() + 1, "analytics event queued");
        queue.push(event);
        Ok(())
    }

    /// Send queued events in collector sized batches and return how many went
    /// out. A failed batch goes back to the front of the queue together with
    /// everything after it, ahead of events logged during the flush.
    ///
    /// The queue is not locked while a batch is in flight, so `log_event`
    /// never waits on the network.
    pub fn flush(&self) -> Result<usize, AnalyticsError> {
        self.ensure_live()?;
        if !self.is_collection_enabled() {
            return Ok(0);
        }

        let _flushing = lock(&self.inner.flushing);
        let mut pending = std::mem::take(&mut *lock(&self.inner.queue));
        let user_id = self.user_id();
        let mut sent = 0;

        while sent < pending.len() {
            let end = (sent + MAX_BATCH_EVENTS).min(pending.len());
            let batch = EventBatch {
                client_id: self.inner.client_id.to_string(),
                user_id: user_id.clone(),
                events: pending[sent..end].to_vec(),
            };

            if let Err(err) = self.inner.dispatcher.dispatch(&batch) {
                let mut queue = lock(&self.inner.queue);
                let logged_meanwhile = std::mem::take(&mut *queue);
                queue.extend(pending.drain(sent..));
                queue.extend(logged_meanwhile);
                tracing::warn!(
                    app = %self.inner.app.name(),
                    sent,
                    remaining = queue.len(),
                    error = %err,
                    "analytics flush failed"
                );
                return Err(err.into());
            }

            sent = end;
        }

        if sent > 0 {
            tracing::debug!(app = %self.inner.app.name(), sent, "analytics queue flushed");
        }
        Ok(sent)
    }

    fn ensure_live(&self) -> Result<(), AnalyticsError> {
        if self.inner.app.is_deleted() {
            return Err(AnalyticsError::AppDeleted {
                app: self.inner.app.name().to_string(),
            });
        }
        Ok(())
    }
}

impl PartialEq for Analytics {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Analytics {}

impl fmt::Debug for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("app", &self.inner.app.name())
            .field("measurement_id", &self.inner.measurement_id)
            .field("client_id", &self.inner.client_id)
            .field("collection_enabled", &self.is_collection_enabled())
            .finish()
    }
}
