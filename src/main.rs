use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fleetsync::config::SyncConfig;
use fleetsync::logging::init_tracing;
use fleetsync::{FetchState, Poller};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "fleetsync", version, about = "Poll gateway fleet endpoints with stale-while-revalidate semantics")]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll a JSON endpoint and log every change until Ctrl-C.
    Watch {
        url: String,
        /// Override the configured poll interval.
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Bearer token sent with every request.
        #[arg(long)]
        bearer: Option<String>,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SyncConfig::load_from(path)?,
        None => SyncConfig::load()?,
    };

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml().context("rendering config")?);
            Ok(())
        }
        Command::Watch {
            url,
            interval_ms,
            bearer,
        } => {
            init_tracing(&config.logging);
            watch(config, url, interval_ms, bearer).await
        }
    }
}

async fn watch(
    config: SyncConfig,
    url: String,
    interval_ms: Option<u64>,
    bearer: Option<String>,
) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let mut builder = Poller::builder(move || {
        let request = client.get(&url);
        let request = match &bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        async move {
            request
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        }
    })
    .with_config(&config.poller);
    if let Some(ms) = interval_ms {
        builder = builder.interval(Duration::from_millis(ms));
    }

    let poller = builder.spawn();
    let mut updates = poller.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                report(&state);
            }
        }
    }

    poller.dispose();
    Ok(())
}

fn report(state: &FetchState<Value>) {
    let items = match &state.data {
        Some(Value::Array(items)) => Some(items.len()),
        Some(_) => Some(1),
        None => None,
    };

    match &state.error {
        Some(err) => tracing::warn!(
            error = %err,
            items = ?items,
            stale = state.is_stale,
            "Fetch error"
        ),
        None => tracing::info!(
            items = ?items,
            loading = state.is_loading,
            revalidating = state.is_revalidating,
            stale = state.is_stale,
            "Snapshot"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_watch_with_overrides() {
        let cli = Cli::parse_from([
            "fleetsync",
            "--config",
            "/tmp/fleetsync.toml",
            "watch",
            "http://gw.local/api/devices",
            "--interval-ms",
            "2500",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fleetsync.toml")));
        match cli.command {
            Command::Watch {
                url, interval_ms, ..
            } => {
                assert_eq!(url, "http://gw.local/api/devices");
                assert_eq!(interval_ms, Some(2500));
            }
            other => panic!("expected watch, got {:?}", other),
        }
    }

    #[test]
    fn parse_config_command() {
        let cli = Cli::parse_from(["fleetsync", "config"]);
        assert!(matches!(cli.command, Command::Config));
        assert!(cli.config.is_none());
    }
}
