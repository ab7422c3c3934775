//! CLI command implementations.

pub mod config;
pub mod fetch;
pub mod watch;

use anyhow::{Context, Result};
use clap::ValueEnum;
use dreambot_net::{DebugScopes, FetchError, FetchOptions, NetworkClient};
use dreambot_store::Config;

use crate::Cli;

/// How a response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum PayloadKind {
    /// Raw bytes.
    Bytes,
    /// UTF-8 text.
    #[default]
    Text,
    /// JSON document.
    Json,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// JSON document.
    Json(serde_json::Value),
}

/// Builds the shared client from configuration plus `--debug-scope` flags.
pub fn build_client(cli: &Cli, config: &Config) -> Result<NetworkClient> {
    let scopes = DebugScopes::with_enabled(cli.debug_scopes.iter().cloned());
    config
        .network
        .build_client(&scopes)
        .context("failed to build network client")
}

/// Fetches `url` with the typed operation matching `kind`.
pub async fn fetch_payload(
    client: &NetworkClient,
    url: &str,
    kind: PayloadKind,
    options: &FetchOptions,
) -> Result<Option<Payload>, FetchError> {
    Ok(match kind {
        PayloadKind::Bytes => client.fetch_bytes(url, options).await?.map(Payload::Bytes),
        PayloadKind::Text => client.fetch_text(url, options).await?.map(Payload::Text),
        PayloadKind::Json => client
            .fetch_json::<serde_json::Value>(url, options)
            .await?
            .map(Payload::Json),
    })
}

/// Parses a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in `{raw}`"));
    }

    Ok((name.to_string(), value.trim().to_string()))
}
