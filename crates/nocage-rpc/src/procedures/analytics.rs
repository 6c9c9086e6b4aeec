//! `analytics.*` procedures.
//!
//! Events are acknowledged and handed to the configured [`AnalyticsSink`].
//! The default [`TracingSink`] writes them to the log under the
//! `nocage::analytics` target; nothing is persisted here.

use chrono::{DateTime, Utc};
use nocage_core::{
  analytics::{AnalyticsEvent, AnalyticsSink},
  store::UserStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AppState, context::RpcContext, error::RpcError};

pub const TRACK_EVENT: &str = "analytics.trackEvent";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventInput {
  pub event:      String,
  #[serde(default)]
  pub properties: Option<Map<String, Value>>,
  /// Only used when the caller is anonymous.
  #[serde(default)]
  pub user_id:    Option<String>,
  /// Client-side timestamp; defaults to receipt time.
  #[serde(default)]
  pub timestamp:  Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackEventOutput {
  pub success: bool,
}

pub fn track_event<S: UserStore>(
  state: &AppState<S>,
  ctx:   &RpcContext<S>,
  input: TrackEventInput,
) -> Result<TrackEventOutput, RpcError> {
  let user_id = ctx.user.as_ref().map(|u| u.id.clone()).or(input.user_id);
  let event = AnalyticsEvent::new(
    input.event,
    input.properties.unwrap_or_default(),
    user_id,
    input.timestamp.unwrap_or_else(Utc::now),
  )?;

  state.analytics.record(&event);
  Ok(TrackEventOutput { success: true })
}

/// Writes each event as a structured log record.
#[derive(Debug, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
  fn record(&self, event: &AnalyticsEvent) {
    let properties = serde_json::to_string(&event.properties).unwrap_or_default();
    tracing::info!(
      target: "nocage::analytics",
      event = %event.event,
      user_id = event.user_id.as_deref(),
      timestamp = %event.timestamp,
      %properties,
      "analytics event"
    );
  }
}
