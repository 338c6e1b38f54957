use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::error::AnalyticsError;

pub const MAX_EVENT_NAME_LEN: usize = 40;
pub const MAX_EVENT_PARAMS: usize = 25;
pub const MAX_PARAM_VALUE_LEN: usize = 100;

const RESERVED_PREFIXES: &[&str] = &["firebase_", "google_", "ga_"];

/// One named event with its parameters, checked against collector limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub params: Map<String, Value>,
    /// When the event was logged, not when it was sent.
    pub timestamp_micros: i64,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Result<Self, AnalyticsError> {
        let name = name.into();
        check_name("event name", &name)?;

        if params.len() > MAX_EVENT_PARAMS {
            return Err(AnalyticsError::invalid_event(format!(
                "event '{name}' has {} params, at most {MAX_EVENT_PARAMS} allowed",
                params.len()
            )));
        }
        for (key, value) in &params {
            check_name("param name", key)?;
            if let Value::String(text) = value {
                if text.chars().count() > MAX_PARAM_VALUE_LEN {
                    return Err(AnalyticsError::invalid_event(format!(
                        "param '{key}' value exceeds {MAX_PARAM_VALUE_LEN} characters"
                    )));
                }
            }
        }

        Ok(Self {
            name,
            params,
            timestamp_micros: now_micros(),
        })
    }
}

fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

fn check_name(kind: &str, name: &str) -> Result<(), AnalyticsError> {
    if name.is_empty() || name.len() > MAX_EVENT_NAME_LEN {
        return Err(AnalyticsError::invalid_event(format!(
            "{kind} '{name}' must be 1 to {MAX_EVENT_NAME_LEN} characters"
        )));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(AnalyticsError::invalid_event(format!(
            "{kind} '{name}' must start with a letter"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AnalyticsError::invalid_event(format!(
            "{kind} '{name}' may only contain letters, digits and underscores"
        )));
    }
    if RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return Err(AnalyticsError::invalid_event(format!(
            "{kind} '{name}' uses a reserved prefix"
        )));
    }
    Ok(())
}
