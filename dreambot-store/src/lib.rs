// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # DreamBot Store
//!
//! Configuration persistence for DreamBot.
//!
//! - **Config**: network and logging settings, stored as JSON
//! - **Persistence**: atomic, owner-only JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use dreambot_net::DebugScopes;
//! use dreambot_store::Config;
//!
//! let config = Config::load().await?;
//! let scopes = DebugScopes::new();
//! let client = config.network.build_client(&scopes)?;
//! ```

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{Config, LoggingConfig, NetworkConfig, RuleConfig};
pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_config_path, ensure_dir, load_json, load_json_or_default,
    save_json,
};
