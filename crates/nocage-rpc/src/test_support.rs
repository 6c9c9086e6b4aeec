//! Shared fixtures for this crate's unit and router tests.

use std::sync::Mutex;

use nocage_core::analytics::{AnalyticsEvent, AnalyticsSink};
use nocage_store_sqlite::SqliteStore;

use crate::{AppState, RawConfig, ServerConfig};

pub fn test_config() -> ServerConfig {
  RawConfig::default()
    .validate(true)
    .expect("fallback config is valid")
}

pub async fn test_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  AppState::new(store, test_config())
}

/// Keeps every event it receives.
#[derive(Default)]
pub struct RecordingSink {
  events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
  pub fn events(&self) -> Vec<AnalyticsEvent> {
    self.events.lock().expect("sink lock").clone()
  }
}

impl AnalyticsSink for RecordingSink {
  fn record(&self, event: &AnalyticsEvent) {
    self.events.lock().expect("sink lock").push(event.clone());
  }
}
