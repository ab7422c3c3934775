//! Watch command - periodic polling through one shared client.
//!
//! Each tick fetches every URL concurrently. A failing endpoint is not
//! retried within a tick; its backoff window decides whether later ticks
//! reach the network again.

use anyhow::Result;
use clap::Args;
use dreambot_net::{FetchError, FetchOptions, NetworkClient};
use dreambot_store::Config;
use futures::future::join_all;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::info;

use super::{Payload, PayloadKind, build_client, fetch_payload};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// URLs to poll.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Refresh interval in seconds.
    #[arg(long, short, default_value = "30")]
    pub interval: u64,

    /// Minimum interval to use.
    #[arg(long, default_value = "5")]
    pub min_interval: u64,

    /// Stop after this many ticks.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// How to decode response bodies.
    #[arg(long = "as", value_enum, default_value = "text")]
    pub kind: PayloadKind,
}

/// Result of polling one URL in one tick.
pub struct PollResult {
    /// Polled URL.
    pub url: String,
    /// Decoded payload, absence, or suppression/failure.
    pub result: Result<Option<Payload>, FetchError>,
}

/// Polls every URL once, concurrently.
///
/// Errors are forwarded so the output can tell a suppressed call from a
/// failed one; they never stop the loop.
pub async fn poll_once(client: &NetworkClient, urls: &[String], kind: PayloadKind) -> Vec<PollResult> {
    let options = FetchOptions::new().forward_exceptions(true);

    let fetches = urls.iter().map(|url| {
        let options = &options;
        async move {
            PollResult {
                url: url.clone(),
                result: fetch_payload(client, url, kind, options).await,
            }
        }
    });

    join_all(fetches).await
}

/// Runs the watch command.
pub async fn run(args: &WatchArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let refresh_interval = args.interval.max(args.min_interval);
    let client = build_client(cli, config)?;

    info!(interval = refresh_interval, urls = args.urls.len(), "Starting watch mode");

    let text = TextFormatter::new(!cli.no_color);
    let json = JsonFormatter::new(cli.pretty);

    let mut ticker = interval(Duration::from_secs(refresh_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tick = 0u64;
    loop {
        ticker.tick().await;
        tick += 1;

        let now = chrono::Local::now();
        let results = poll_once(&client, &args.urls, args.kind).await;
        let backoff = client.registry().snapshot();

        match cli.format {
            OutputFormat::Text => {
                println!("{}", text.format_tick(now, &results, &backoff));
            }
            OutputFormat::Json => {
                println!("{}", json.format_tick(now, &results, &backoff)?);
            }
        }

        if args.ticks.is_some_and(|limit| tick >= limit) {
            return Ok(ExitCode::Success);
        }
    }
}
