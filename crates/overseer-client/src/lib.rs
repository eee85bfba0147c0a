//! Overseer Client - announce and resolve services through an overseer registry
//!
//! This crate provides:
//! - `Announcer`: registers a service on a background task, retries with
//!   backoff and renews the registration periodically
//! - `Resolver`: resolves a service name to its address with a bounded wait
//! - Explicit, validated configuration with optional environment loading

pub mod announce;
pub mod attempt;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod resolve;

pub use announce::listener::{AnnounceEvent, AnnounceListener, FnAnnounceListener};
pub use announce::{AnnounceHandle, AnnounceSummary, Announcer, announce, announce_from_env};
pub use config::{AnnounceConfig, OverseerEndpoint, RetryPolicy};
pub use error::{ClientError, Result};
pub use model::{Registration, ResolvedService};
pub use resolve::{Resolver, resolve};
