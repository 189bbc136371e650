//! Command line client: send a beat (or a deletion) to a pulsewatch hub
//!
//! ```text
//! pulsewatch-beat db-backup --warning 3600 --error auto
//! pulsewatch-beat db-backup --delete
//! ```

use anyhow::{Context, bail};
use clap::Parser;
use pulsewatch::{Timeout, api::BeatRequest};
use reqwest::{Client, Method};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Send a heartbeat to a pulsewatch hub")]
struct Args {
    /// Service name
    service: String,

    /// Warning timeout: seconds, "auto" or "clear"
    #[arg(short, long)]
    warning: Option<Timeout>,

    /// Error timeout: seconds, "auto" or "clear"
    #[arg(short, long)]
    error: Option<Timeout>,

    /// Pause (true) or resume (false) the service
    #[arg(long)]
    paused: Option<bool>,

    /// Only change the configuration, do not register a beat
    #[arg(long, conflicts_with = "delete")]
    no_beat: bool,

    /// Delete the service instead
    #[arg(long)]
    delete: bool,

    /// Hub base URL
    #[arg(long, env = "PULSEWATCH_HUB", default_value = "http://127.0.0.1:8080")]
    hub: String,

    /// Bearer token, if the hub requires one
    #[arg(long, env = "PULSEWATCH_TOKEN")]
    token: Option<String>,

    /// Print request details
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter::Targets::new().with_target("pulsewatch_beat", level))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);

    let url = format!(
        "{}/api/v1/services/{}",
        args.hub.trim_end_matches('/'),
        args.service
    );

    let client = Client::new();
    let mut request = if args.delete {
        client.request(Method::DELETE, &url)
    } else {
        let body = BeatRequest {
            warning_timeout: args.warning,
            error_timeout: args.error,
            paused: args.paused,
        };
        let method = if args.no_beat { Method::PUT } else { Method::POST };
        client.request(method, &url).json(&body)
    };

    if let Some(token) = &args.token {
        request = request.bearer_auth(token);
    }

    debug!("sending request to {url}");
    let response = request
        .send()
        .await
        .with_context(|| format!("could not reach hub at {}", args.hub))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("hub answered {status}: {body}");
    }

    debug!("hub answered {status}");
    Ok(())
}
