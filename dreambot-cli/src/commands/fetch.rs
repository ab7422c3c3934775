//! Fetch command - one request through the network layer.

use std::io::{Write, stdout};

use anyhow::Result;
use clap::Args;
use dreambot_net::FetchOptions;
use dreambot_store::Config;

use super::{Payload, PayloadKind, build_client, fetch_payload, parse_header};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// URL to fetch.
    pub url: String,

    /// How to decode the response body.
    #[arg(long = "as", value_enum, default_value = "text")]
    pub kind: PayloadKind,

    /// Extra request header, `Name: value` (repeatable).
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Report the classified error instead of "no response".
    #[arg(long)]
    pub forward_exceptions: bool,

    /// Ignore and leave untouched any backoff for this URL.
    #[arg(long)]
    pub bypass_backoff: bool,

    /// Treat an empty response as an error.
    #[arg(long)]
    pub raise_empty: bool,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,
}

impl FetchArgs {
    /// Per-call options for the network layer.
    pub fn options(&self) -> FetchOptions {
        let mut options = FetchOptions::new()
            .forward_exceptions(self.forward_exceptions)
            .bypass_backoff(self.bypass_backoff)
            .raise_for_empty_response(self.raise_empty);

        for (name, value) in &self.headers {
            options = options.header(name, value);
        }
        if self.insecure {
            options = options.tls_verify(false);
        }
        options
    }
}

/// Runs the fetch command.
pub async fn run(args: &FetchArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let client = build_client(cli, config)?;
    let result = fetch_payload(&client, &args.url, args.kind, &args.options()).await?;

    let Some(payload) = result else {
        if !cli.quiet {
            eprintln!("No response from {}", args.url);
        }
        return Ok(ExitCode::NoResponse);
    };

    match (cli.format, payload) {
        // Raw bytes go to stdout untouched so they can be piped.
        (OutputFormat::Text, Payload::Bytes(bytes)) => {
            let mut out = stdout().lock();
            out.write_all(&bytes)?;
            out.flush()?;
        }
        (OutputFormat::Text, payload) => {
            println!("{}", TextFormatter::new(!cli.no_color).format_payload(&payload));
        }
        (OutputFormat::Json, payload) => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_payload(&args.url, &payload)?);
        }
    }

    Ok(ExitCode::Success)
}
