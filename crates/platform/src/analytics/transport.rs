use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::event::AnalyticsEvent;
use crate::lock;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload delivered to the collector in one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBatch {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub events: Vec<AnalyticsEvent>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector rejected batch with status {status}")]
    Status { status: u16 },
}

/// Delivers batches somewhere. Implementations must not retry on their own.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, batch: &EventBatch) -> Result<(), DispatchError>;
}

/// Server-side delivery through the Measurement Protocol collect endpoint.
pub struct MeasurementProtocolDispatcher {
    client: reqwest::blocking::Client,
    endpoint: String,
    measurement_id: String,
    api_secret: String,
}

impl MeasurementProtocolDispatcher {
    pub fn new(
        endpoint: impl Into<String>,
        measurement_id: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            measurement_id: measurement_id.into(),
            api_secret: api_secret.into(),
        })
    }
}

impl Dispatcher for MeasurementProtocolDispatcher {
    fn dispatch(&self, batch: &EventBatch) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("measurement_id", self.measurement_id.as_str()),
                ("api_secret", self.api_secret.as_str()),
            ])
            .json(batch)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            measurement_id = %self.measurement_id,
            events = batch.events.len(),
            "analytics batch delivered"
        );
        Ok(())
    }
}

/// Keeps batches in memory instead of sending them.
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    batches: Mutex<Vec<EventBatch>>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<EventBatch> {
        lock(&self.batches).clone()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.batches)
            .iter()
            .map(|batch| batch.events.len())
            .sum()
    }
}

impl Dispatcher for MemoryDispatcher {
    fn dispatch(&self, batch: &EventBatch) -> Result<(), DispatchError> {
        lock(&self.batches).push(batch.clone());
        Ok(())
    }
}
