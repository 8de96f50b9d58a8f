use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ratewarden::config::{LogFormat, LoggingConfig, RatewardenConfig, StoreBackend};
use ratewarden::ratelimit::{LimiterRegistry, RateLimitRules};
use ratewarden::store::{CounterStore, MemoryStore, RedisStore};

/// Fixed-window admission control against a shared counter store.
#[derive(Debug, Parser)]
#[command(name = "ratewarden", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a YAML rules file; replaces the configured `limits`
    #[arg(short, long)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run admission checks for an operation class
    Check {
        /// Operation class, as named under `limits`
        operation: String,

        /// Number of consecutive attempts
        #[arg(short = 'n', long, default_value_t = 1)]
        attempts: u32,
    },
    /// Print the current window of an operation class as JSON
    Inspect {
        /// Operation class, as named under `limits`
        operation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = RatewardenConfig::load(cli.config.as_deref())?;

    init_tracing(&config.logging);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = &cli.rules {
        config.limits = RateLimitRules::from_file(path)?;
    }

    let store: Arc<dyn CounterStore> = match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using in-process counter store; windows are not shared");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Redis => Arc::new(RedisStore::connect(&config.store.redis_url).await?),
    };

    let registry = LimiterRegistry::from_rules(store, &config.limits, &config.store.key_prefix)?;
    info!(operations = ?registry.operations(), "Limiters initialized");

    match cli.command {
        Command::Check {
            operation,
            attempts,
        } => {
            let limiter = registry.limiter(&operation)?;
            let mut last_allowed = true;

            for attempt in 1..=attempts {
                let decision = limiter.check().await?;
                println!(
                    "{} attempt={} count={} remaining={}",
                    if decision.allowed { "ALLOWED" } else { "DENIED" },
                    attempt,
                    decision.count,
                    decision.remaining
                );
                last_allowed = decision.allowed;
            }

            if !last_allowed {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Inspect { operation } => {
            let limiter = registry.limiter(&operation)?;
            let count = limiter.current_count().await?;
            let ttl = limiter.time_until_reset().await?;

            let report = json!({
                "operation": operation,
                "key": limiter.key().as_str(),
                "count": count,
                "limit": limiter.config().max_requests,
                "window_seconds": limiter.config().window.as_secs(),
                "ttl_ms": ttl.map(|d| d.as_millis() as u64),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init(),
    }
}
