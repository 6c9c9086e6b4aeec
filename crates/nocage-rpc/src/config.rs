//! Runtime server configuration.
//!
//! Values come from an optional TOML file and `NOCAGE_*` environment
//! variables. Everything is validated once at start-up so a misconfigured
//! process fails before it binds a socket.

use std::{
  fmt,
  path::{Path, PathBuf},
  time::Duration,
};

use axum::http::HeaderName;
use nocage_core::{referral::DEFAULT_MAX_ATTEMPTS, user::IDENTITY_HEADER};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REFERRAL_TIMEOUT_MS: u64 = 5_000;
const MAX_REFERRAL_ATTEMPTS: u32 = 100;

// Substituted for required values when validation is skipped.
const FALLBACK_DATABASE_URL: &str = ":memory:";
const FALLBACK_AUTH_URL: &str = "http://localhost:3001";

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Development,
  Test,
  Production,
}

impl Mode {
  fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "development" => Some(Self::Development),
      "test" => Some(Self::Test),
      "production" => Some(Self::Production),
      _ => None,
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Development => "development",
      Self::Test => "test",
      Self::Production => "production",
    })
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration: {0}")]
  Source(#[from] config::ConfigError),

  #[error("invalid environment configuration:\n  - {}", .0.join("\n  - "))]
  Invalid(Vec<String>),
}

/// Configuration exactly as read from the sources, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
  pub host:                  Option<String>,
  pub port:                  Option<u16>,
  pub database_url:          Option<String>,
  pub auth_url:              Option<String>,
  pub environment:           Option<String>,
  pub identity_header:       Option<String>,
  pub referral_max_attempts: Option<u32>,
  pub referral_timeout_ms:   Option<u64>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub database_url:          String,
  pub auth_url:              String,
  pub environment:           Mode,
  pub identity_header:       HeaderName,
  pub referral_max_attempts: u32,
  pub referral_timeout:      Duration,
}

impl RawConfig {
  /// Read `path` (if it exists) layered under `NOCAGE_*` environment
  /// variables.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("NOCAGE").try_parsing(true))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// Check every value, reporting all problems at once.
  ///
  /// With `skip_required` set, missing required values are replaced with
  /// development defaults instead of failing. Values that are present but
  /// malformed are always rejected.
  pub fn validate(self, skip_required: bool) -> Result<ServerConfig, ConfigError> {
    let mut problems = Vec::new();

    let mut required = |value: Option<String>, key: &str, fallback: &str| {
      match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None if skip_required => fallback.to_owned(),
        None => {
          problems.push(format!("{key} is required"));
          String::new()
        }
      }
    };

    let database_url = required(self.database_url, "database_url", FALLBACK_DATABASE_URL);
    let auth_url = required(self.auth_url, "auth_url", FALLBACK_AUTH_URL);
    let environment_raw = required(self.environment, "environment", "development");

    if !auth_url.is_empty()
      && !(auth_url.starts_with("http://") || auth_url.starts_with("https://"))
    {
      problems.push(format!("auth_url must be an http(s) URL, got {auth_url:?}"));
    }

    let environment = if environment_raw.is_empty() {
      Mode::Development
    } else {
      Mode::parse(&environment_raw).unwrap_or_else(|| {
        problems.push(format!(
          "environment must be one of development, test, production; got {environment_raw:?}"
        ));
        Mode::Development
      })
    };

    let header_raw = self
      .identity_header
      .unwrap_or_else(|| IDENTITY_HEADER.to_owned())
      .to_ascii_lowercase();
    let identity_header = HeaderName::from_bytes(header_raw.as_bytes()).unwrap_or_else(|_| {
      problems.push(format!("identity_header {header_raw:?} is not a valid header name"));
      HeaderName::from_static(IDENTITY_HEADER)
    });

    let referral_max_attempts = self.referral_max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
    if !(1..=MAX_REFERRAL_ATTEMPTS).contains(&referral_max_attempts) {
      problems.push(format!(
        "referral_max_attempts must be between 1 and {MAX_REFERRAL_ATTEMPTS}, got {referral_max_attempts}"
      ));
    }

    let referral_timeout_ms = self.referral_timeout_ms.unwrap_or(DEFAULT_REFERRAL_TIMEOUT_MS);
    if referral_timeout_ms == 0 {
      problems.push("referral_timeout_ms must be greater than zero".to_owned());
    }

    if !problems.is_empty() {
      return Err(ConfigError::Invalid(problems));
    }

    Ok(ServerConfig {
      host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_owned()),
      port: self.port.unwrap_or(DEFAULT_PORT),
      database_url,
      auth_url,
      environment,
      identity_header,
      referral_max_attempts,
      referral_timeout: Duration::from_millis(referral_timeout_ms),
    })
  }
}

impl ServerConfig {
  /// Filesystem path of the SQLite database, with any `sqlite:` scheme
  /// stripped and a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf {
    let url = self.database_url.as_str();
    let path = url
      .strip_prefix("sqlite://")
      .or_else(|| url.strip_prefix("sqlite:"))
      .unwrap_or(url);
    expand_tilde(Path::new(path))
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn complete() -> RawConfig {
    RawConfig {
      database_url: Some("sqlite://hub.db".into()),
      auth_url: Some("https://auth.nocage.example".into()),
      environment: Some("production".into()),
      ..RawConfig::default()
    }
  }

  #[test]
  fn complete_config_validates_with_defaults() {
    let cfg = complete().validate(false).unwrap();
    assert_eq!(cfg.environment, Mode::Production);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.identity_header.as_str(), IDENTITY_HEADER);
    assert_eq!(cfg.referral_max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(cfg.referral_timeout, Duration::from_secs(5));
    assert_eq!(cfg.store_path(), PathBuf::from("hub.db"));
  }

  #[test]
  fn missing_required_values_are_all_reported() {
    let err = RawConfig::default().validate(false).unwrap_err();
    let ConfigError::Invalid(problems) = err else {
      panic!("expected Invalid");
    };
    assert_eq!(problems.len(), 3, "{problems:?}");
    assert!(problems.iter().any(|p| p.contains("database_url")));
    assert!(problems.iter().any(|p| p.contains("auth_url")));
    assert!(problems.iter().any(|p| p.contains("environment")));
  }

  #[test]
  fn skipping_validation_fills_fallbacks() {
    let cfg = RawConfig::default().validate(true).unwrap();
    assert_eq!(cfg.database_url, FALLBACK_DATABASE_URL);
    assert_eq!(cfg.auth_url, FALLBACK_AUTH_URL);
    assert_eq!(cfg.environment, Mode::Development);
  }

  #[test]
  fn malformed_values_fail_even_when_skipping() {
    let raw = RawConfig {
      auth_url: Some("ftp://nope".into()),
      environment: Some("staging".into()),
      referral_max_attempts: Some(0),
      identity_header: Some("bad header".into()),
      ..complete()
    };
    let ConfigError::Invalid(problems) = raw.validate(true).unwrap_err() else {
      panic!("expected Invalid");
    };
    assert_eq!(problems.len(), 4, "{problems:?}");
  }
}
