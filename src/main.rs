use anyhow::Result;
use clap::{Parser, Subcommand};
use floodgate::{Admission, Config, CounterStore, Error, RateLimiter, RedisStore};
use serde::Serialize;
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// EX_TEMPFAIL: the caller should try again later.
const EXIT_FLOOD_WAIT: u8 = 75;

#[derive(Debug, Serialize)]
struct Admitted<'a> {
    identifier: &'a str,
    admitted: bool,
    #[serde(flatten)]
    admission: Admission,
}

#[derive(Debug, Parser)]
#[command(name = "floodgate", version, about = "Distributed fixed-window rate limiter")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Count a call for an identifier and report whether it is admitted
    Acquire {
        identifier: String,
        /// Sleep out denials and retry, up to this many calls in total
        #[arg(long, default_value_t = 1)]
        attempts: u32,
    },
    /// Show how many calls the current window holds
    Usage { identifier: String },
    /// Show the time until the identifier's window resets
    Remaining { identifier: String },
    /// Drop the identifier's current window
    Reset { identifier: String },
    /// Check that the store is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.config;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("floodgate={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let policy = config
        .policy()
        .map_err(|e| anyhow::anyhow!("Failed to load rate limit policy: {}", e))?;

    tracing::info!(
        redis_url = %config.redis_url,
        key_prefix = %policy.key_prefix,
        rate = policy.rate,
        period = %humantime::format_duration(policy.period),
        "Configuration loaded"
    );

    let store = RedisStore::connect(&config.redis_url).await?;
    let limiter = RateLimiter::new(Arc::new(store.clone()), policy)?;

    match cli.command {
        Command::Acquire { identifier, attempts } => {
            match limiter.acquire_with_retry(&identifier, attempts).await {
                Ok(admission) => {
                    let admitted = Admitted {
                        identifier: &identifier,
                        admitted: true,
                        admission,
                    };
                    println!("{}", serde_json::to_string(&admitted)?);
                }
                Err(Error::FloodWait(wait)) => {
                    tracing::info!(%wait, "Call denied");
                    println!("{}", serde_json::to_string(&wait)?);
                    return Ok(ExitCode::from(EXIT_FLOOD_WAIT));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Usage { identifier } => {
            let usage = limiter.usage(&identifier).await?;
            println!("{}", json!({ "identifier": identifier, "usage": usage, "rate": limiter.policy().rate }));
        }
        Command::Remaining { identifier } => {
            let remaining = limiter.remaining(&identifier).await?;
            println!(
                "{}",
                json!({
                    "identifier": identifier,
                    "remaining": humantime::format_duration(remaining).to_string(),
                    "remaining_ms": saturating_millis(remaining),
                })
            );
        }
        Command::Reset { identifier } => {
            let cleared = limiter.reset(&identifier).await?;
            println!("{}", json!({ "identifier": identifier, "reset": cleared }));
        }
        Command::Ping => {
            store.ping().await?;
            println!("{}", json!({ "store": "ok" }));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
