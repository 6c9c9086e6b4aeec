//! Async HTTP client for the Nocage Hub RPC surface.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use nocage_core::{
  analytics::AnalyticsEvent,
  referral::ReferralCode,
  user::{IDENTITY_HEADER, UserIdentity},
};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use std::time::Duration;

/// Connection settings for the RPC server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url: String,
  /// Identity to forward as the gateway would; `None` calls anonymously.
  pub identity: Option<UserIdentity>,
}

/// Async HTTP client for the tRPC endpoints.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HubClient {
  client: Client,
  config: ClientConfig,
}

/// Either half of the tRPC response envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
  Result { result: ResultBody<T> },
  Error { error: ErrorBody },
}

#[derive(Deserialize)]
struct ResultBody<T> {
  data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
  message: String,
  #[serde(default)]
  data:    Option<ErrorData>,
}

#[derive(Deserialize)]
struct ErrorData {
  code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateOutput {
  referral_code: ReferralCode,
}

#[derive(Deserialize)]
struct TrackEventOutput {
  success: bool,
}

impl HubClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  /// The identity this client forwards, if any.
  pub fn identity(&self) -> Option<&UserIdentity> { self.config.identity.as_ref() }

  fn url(&self, procedure: &str) -> String {
    format!(
      "{}/trpc/{}",
      self.config.base_url.trim_end_matches('/'),
      procedure
    )
  }

  fn identify(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
    match &self.config.identity {
      Some(identity) => Ok(req.header(IDENTITY_HEADER, identity.to_header_value()?)),
      None => Ok(req),
    }
  }

  async fn decode<T: DeserializeOwned>(
    procedure: &str,
    resp: reqwest::Response,
  ) -> Result<T> {
    let status = resp.status();
    let envelope: Envelope<T> = resp
      .json()
      .await
      .with_context(|| format!("{procedure} → {status}: unreadable response"))?;
    match envelope {
      Envelope::Result { result } => Ok(result.data),
      Envelope::Error { error } => {
        let code = error.data.map(|d| d.code).unwrap_or_default();
        Err(anyhow!("{procedure} → {status} {code}: {}", error.message))
      }
    }
  }

  async fn query<T: DeserializeOwned>(&self, procedure: &str) -> Result<T> {
    let resp = self
      .identify(self.client.get(self.url(procedure)))?
      .send()
      .await
      .with_context(|| format!("GET {procedure} failed"))?;
    Self::decode(procedure, resp).await
  }

  async fn mutate<T: DeserializeOwned>(&self, procedure: &str, input: &Value) -> Result<T> {
    let resp = self
      .identify(self.client.post(self.url(procedure)))?
      .json(input)
      .send()
      .await
      .with_context(|| format!("POST {procedure} failed"))?;
    Self::decode(procedure, resp).await
  }

  // ── Procedures ────────────────────────────────────────────────────────────

  /// `user.getCurrentUser`
  pub async fn current_user(&self) -> Result<Option<UserIdentity>> {
    self.query("user.getCurrentUser").await
  }

  /// `referral.generate`
  pub async fn generate_referral(&self) -> Result<ReferralCode> {
    let out: GenerateOutput = self.mutate("referral.generate", &Value::Null).await?;
    Ok(out.referral_code)
  }

  /// `analytics.trackEvent`
  pub async fn track_event(&self, event: &str, properties: Map<String, Value>) -> Result<bool> {
    // Validate locally so obviously bad events never leave the process.
    let event = AnalyticsEvent::new(event, properties, None, Utc::now())?;
    let input = json!({
      "event":      event.event,
      "properties": event.properties,
      "timestamp":  event.timestamp,
    });
    let out: TrackEventOutput = self.mutate("analytics.trackEvent", &input).await?;
    Ok(out.success)
  }
}
