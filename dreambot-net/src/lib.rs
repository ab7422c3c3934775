// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # DreamBot Net
//!
//! Outbound HTTP for DreamBot's pollers and commands.
//!
//! Every request to an external API (price feeds, wikis, CDNs, AI services)
//! goes through one [`NetworkClient`]. The client:
//!
//! - makes at most one GET per call, never retrying internally
//! - tracks consecutive failures per endpoint in a [`BackoffRegistry`]
//! - suppresses calls to an endpoint while its backoff window is open
//! - logs and swallows failures by default, returning `Ok(None)`
//!
//! ## Modules
//!
//! - [`backoff`] - Backoff state and URL-pattern rules
//! - [`registry`] - Per-client rule registry
//! - [`client`] - Request executor and typed fetch operations
//! - [`transport`] - HTTP transport seam and the `reqwest` implementation
//! - [`scope`] - Runtime-toggleable debug scopes
//! - [`error`] - Error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use dreambot_net::{FetchOptions, NetworkClient};
//!
//! let client = NetworkClient::new()?;
//!
//! // Degrades to None on failure or while the endpoint is backing off.
//! let prices: Option<serde_json::Value> = client
//!     .fetch_json("https://prices.example/latest", &FetchOptions::default())
//!     .await?;
//!
//! // Strict callers receive the classified error.
//! let page = client
//!     .fetch_text("https://wiki.example/page", &FetchOptions::new().forward_exceptions(true))
//!     .await?;
//! ```

pub mod backoff;
pub mod client;
pub mod error;
pub mod registry;
pub mod scope;
pub mod transport;

pub use backoff::{BackoffRule, BackoffState, describe_secs};
pub use client::{ClientSettings, DEFAULT_MAX_BACKOFF_SECS, FetchOptions, NetworkClient};
pub use error::{BoxError, FetchError, Severity};
pub use registry::{BackoffRegistry, BackoffSnapshot};
pub use scope::{DebugScopes, NETWORK_SCOPE};
pub use transport::{Headers, ReqwestTransport, Transport, TransportRequest, USER_AGENT};
