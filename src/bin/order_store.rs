//! Command-line access to an order store.
//!
//! ```text
//! order-store insert '{"OrderId":1,"CustomerId":"c1"}'
//! order-store get 1
//! order-store list --all
//! order-store delete 1
//! ```
//!
//! Orders for `insert` and `update` are read from the argument, or from
//! stdin when it is omitted or `-`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use order_store::domain::entities::Order;
use order_store::domain::value_objects::OrderId;
use order_store::infrastructure::config::StoreConfig;
use order_store::infrastructure::kv::RedisBackend;
use order_store::infrastructure::persistence::{
    CallContext, FindAllPage, OrderRepository, OrderStore, drain_all,
};
use order_store::infrastructure::telemetry::{DEFAULT_LOG_FILTER, LogFormat, init_tracing};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "order-store", version, about = "Manage orders stored in Redis")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Redis URL, overriding configuration.
    #[arg(long, global = true)]
    redis_url: Option<String>,

    /// Per-operation timeout in milliseconds, overriding configuration.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Insert a new order.
    Insert {
        /// Order JSON, or `-` for stdin.
        order: Option<String>,
    },
    /// Print an order.
    Get {
        /// Order id.
        id: u64,
    },
    /// Replace an existing order.
    Update {
        /// Order JSON, or `-` for stdin.
        order: Option<String>,
    },
    /// Delete an order.
    Delete {
        /// Order id.
        id: u64,
    },
    /// List orders one scan step at a time, or all of them.
    List {
        /// Index entries to examine per step.
        #[arg(long, default_value_t = 0)]
        limit: u64,
        /// Cursor from a previous step.
        #[arg(long, default_value_t = 0)]
        cursor: u64,
        /// Follow cursors until the scan completes.
        #[arg(long)]
        all: bool,
    },
    /// Check connectivity.
    Ping,
}

fn read_order(arg: Option<String>) -> Result<Order> {
    let raw = match arg.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read order from stdin")?;
            buf
        }
        Some(json) => json.to_string(),
    };
    serde_json::from_str(&raw).context("order is not valid JSON")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(DEFAULT_LOG_FILTER, format)?;

    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.redis_url {
        config = config.with_redis_url(url);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_operation_timeout_ms(timeout_ms);
    }
    config.validate()?;

    let backend = RedisBackend::connect(config.redis_url())
        .await
        .context("failed to connect to redis")?;
    if let Commands::Ping = cli.command {
        backend.ping().await?;
        println!("PONG");
        return Ok(());
    }

    let store = OrderStore::from_config(Arc::new(backend), &config);
    let timeout = config.operation_timeout();
    let ctx = || CallContext::background().with_timeout(timeout);
    tracing::debug!(command = ?cli.command, "running");

    match cli.command {
        Commands::Insert { order } => {
            let order = read_order(order)?;
            store.insert(&ctx(), &order).await?;
            tracing::info!(order_id = %order.order_id, "inserted");
        }
        Commands::Get { id } => {
            let order = store.find_by_id(&ctx(), OrderId::new(id)).await?;
            print_json(&order)?;
        }
        Commands::Update { order } => {
            let order = read_order(order)?;
            store.update(&ctx(), &order).await?;
            tracing::info!(order_id = %order.order_id, "updated");
        }
        Commands::Delete { id } => {
            store.delete_by_id(&ctx(), OrderId::new(id)).await?;
            tracing::info!(order_id = id, "deleted");
        }
        Commands::List { limit, all: true, .. } => {
            // The per-operation timeout does not cover a full drain.
            let orders = drain_all(&store, &CallContext::background(), limit).await?;
            print_json(&orders)?;
        }
        Commands::List { limit, cursor, all: false } => {
            let result = store.find_all(&ctx(), FindAllPage { limit, cursor }).await?;
            print_json(&serde_json::json!({
                "Orders": result.orders,
                "Cursor": result.cursor,
            }))?;
        }
        Commands::Ping => {}
    }
    Ok(())
}
