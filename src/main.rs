//! cachectl - operator tool for the shared cache
//!
//! `check` verifies the Redis cache answers reads and writes; `invalidate`
//! runs the invalidation dispatcher for one domain, e.g. after a bulk import
//! that bypassed the domain adapters; `counters` prints an academic
//! resource's like and download counters through the cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coherent_cache::cache::bounded;
use coherent_cache::store::PostgresStore;
use coherent_cache::{CacheBackend, Config, Domain, EngagementEngine, Invalidator, RedisBackend};

const CHECK_KEY: &str = "cachectl:check";
const DB_POOL_SIZE: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "cachectl", version, about = "Shared cache operator tool", long_about = None)]
struct Cli {
    /// Redis URL, overrides the configured one
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Postgres URL, required by `counters`
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write, read back and delete a check key
    Check,
    /// Evict a domain's cached views
    Invalidate {
        /// academics, events, projects, gallery, alumni or careers
        domain: Domain,
        /// Entity whose detail view to evict; every listing otherwise
        #[arg(long)]
        id: Option<i64>,
    },
    /// Print an academic resource's counters as JSON
    Counters {
        id: i64,
        /// Read from Postgres, skipping the cache
        #[arg(long)]
        fresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coherent_cache=info,cachectl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.redis_url {
        config.redis_url = url;
    }
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }

    let backend = RedisBackend::connect(&config.redis_url)
        .await
        .context("connecting to redis")?;

    match cli.command {
        Command::Check => check(&backend, config.cache_timeout()).await?,
        Command::Invalidate { domain, id } => {
            let invalidator =
                Invalidator::with_default_sources(Arc::new(backend), config.cache_timeout());
            let report = invalidator.invalidate(domain, id).await;
            println!(
                "{domain}: {} keys evicted, {} failures",
                report.keys_evicted, report.failures
            );
            if !report.is_clean() {
                bail!("{} evictions failed", report.failures);
            }
        }
        Command::Counters { id, fresh } => counters(backend, &config, id, fresh).await?,
    }

    Ok(())
}

async fn check(backend: &RedisBackend, timeout: Duration) -> Result<()> {
    backend.ping().await.context("PING")?;

    let marker = b"ok";
    bounded(timeout, backend.set(CHECK_KEY, marker, Duration::from_secs(10)))
        .await
        .context("writing check key")?;
    let read = bounded(timeout, backend.get(CHECK_KEY))
        .await
        .context("reading check key")?;
    bounded(timeout, backend.delete(CHECK_KEY))
        .await
        .context("deleting check key")?;

    if read.as_deref() != Some(marker.as_slice()) {
        bail!("check key read back {read:?}");
    }

    info!(timeout_ms = timeout.as_millis() as u64, "Cache check passed");
    println!("cache OK");
    Ok(())
}

async fn counters(backend: RedisBackend, config: &Config, id: i64, fresh: bool) -> Result<()> {
    let Some(url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL is not set");
    };
    let store = PostgresStore::connect(url, DB_POOL_SIZE)
        .await
        .context("connecting to postgres")?;
    let engine = EngagementEngine::from_config(store, Arc::new(backend), config);

    let counters = if fresh {
        engine.counters(id).await?
    } else {
        engine.cached_counters(id).await?
    };
    println!("{}", serde_json::to_string_pretty(&counters)?);
    Ok(())
}
