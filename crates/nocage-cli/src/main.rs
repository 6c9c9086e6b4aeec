//! `nocage` — command-line client for the Nocage Hub RPC server.
//!
//! # Usage
//!
//! ```
//! nocage --url http://localhost:3000 --identity '{"id":"user_123"}' whoami
//! nocage --config ~/.config/nocage/config.toml referral
//! nocage track page_view --prop page=/home
//! ```

mod client;
mod session;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use client::{ClientConfig, HubClient};
use nocage_core::user::UserIdentity;
use serde::Deserialize;
use serde_json::{Map, Value};
use session::{Navigation, Session};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:3000";
const DEFAULT_SIGN_OUT_URL: &str = "http://localhost:3000/";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nocage", about = "Command-line client for Nocage Hub")]
struct Args {
  /// Path to a TOML config file (url, identity, sign_out_url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the RPC server (default: http://localhost:3000).
  #[arg(long, env = "NOCAGE_URL")]
  url: Option<String>,

  /// Identity JSON forwarded in the gateway header, e.g. '{"id":"user_123"}'.
  #[arg(long, env = "NOCAGE_IDENTITY")]
  identity: Option<String>,

  /// Where to send the user after signing out.
  #[arg(long, env = "NOCAGE_SIGN_OUT_URL")]
  sign_out_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the identity the server resolves for this client.
  Whoami,
  /// Print (issuing if needed) the caller's referral code.
  Referral,
  /// Send an analytics event.
  Track {
    event: String,
    /// Event property as key=value; repeatable. Values parse as JSON when possible.
    #[arg(long = "prop", value_name = "KEY=VALUE", value_parser = parse_property)]
    props: Vec<(String, Value)>,
  },
  /// Sign out and print where the front end should navigate.
  Logout,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:          String,
  #[serde(default)]
  identity:     Option<UserIdentity>,
  #[serde(default)]
  sign_out_url: String,
}

fn parse_property(raw: &str) -> Result<(String, Value), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
  if key.is_empty() {
    return Err(format!("property key is empty in {raw:?}"));
  }
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
  Ok((key.to_owned(), value))
}

fn non_empty(s: &str) -> Option<String> { (!s.is_empty()).then(|| s.to_owned()) }

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let identity = match args.identity.as_deref() {
    Some(raw) => Some(
      UserIdentity::from_header_value(raw).map_err(|e| anyhow!("--identity: {e}"))?,
    ),
    None => file_cfg.identity,
  };
  let client_config = ClientConfig {
    base_url: args
      .url
      .or_else(|| non_empty(&file_cfg.url))
      .unwrap_or_else(|| DEFAULT_URL.to_string()),
    identity,
  };
  let sign_out_url = args
    .sign_out_url
    .or_else(|| non_empty(&file_cfg.sign_out_url))
    .unwrap_or_else(|| DEFAULT_SIGN_OUT_URL.to_string());

  let client = HubClient::new(client_config)?;
  let mut session = Session::new(sign_out_url);
  println!("{}", run(&client, &mut session, args.command).await?);

  Ok(())
}

/// Execute one subcommand and return what it prints.
///
/// Only commands that need the server talk to it, and transport errors
/// propagate instead of being read as "signed out".
async fn run(client: &HubClient, session: &mut Session, command: Command) -> Result<String> {
  match command {
    Command::Whoami => {
      session.resolve(client.current_user().await?);
      Ok(serde_json::to_string_pretty(session.state())?)
    }
    Command::Referral => {
      if client.identity().is_none() {
        return Err(anyhow!("not signed in; pass --identity"));
      }
      Ok(client.generate_referral().await?.to_string())
    }
    Command::Track { event, props } => {
      let properties: Map<String, Value> = props.into_iter().collect();
      let accepted = client.track_event(&event, properties).await?;
      Ok(if accepted { "ok" } else { "rejected" }.to_owned())
    }
    Command::Logout => {
      session.resolve(client.identity().cloned());
      let Navigation::Redirect(url) = session.sign_out();
      Ok(url)
    }
  }
}
