//! Analytics events relayed from clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// A named client event and its property bag. Never persisted by this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
  pub event:      String,
  #[serde(default)]
  pub properties: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id:    Option<String>,
  pub timestamp:  DateTime<Utc>,
}

impl AnalyticsEvent {
  pub fn new(
    event: impl Into<String>,
    properties: Map<String, Value>,
    user_id: Option<String>,
    timestamp: DateTime<Utc>,
  ) -> Result<Self> {
    let event = event.into();
    if event.trim().is_empty() {
      return Err(Error::EmptyEventName);
    }
    Ok(Self { event, properties, user_id, timestamp })
  }
}

/// Destination for accepted analytics events.
pub trait AnalyticsSink: Send + Sync {
  fn record(&self, event: &AnalyticsEvent);
}
