//! Core types and trait definitions for the Nocage Hub application layer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The RPC surface and the storage backends depend on it; it depends on
//! nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod error;
pub mod referral;
pub mod store;
pub mod user;

pub use error::{Error, Result};
