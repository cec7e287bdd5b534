use std::sync::Arc;

use clap::Parser;
use solace_core::gateway::{CompletionGateway, GatewayClient, GatewayError};
use solace_core::store::{MemoryMessageStore, MessageStore, PgMessageStore};
use solace_core::SolaceConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use solace_server::handler::{ChatHandler, HandlerSettings};
use solace_server::http::{self, HttpState};

/// Environment variable holding the LLM gateway credential.
const GATEWAY_API_KEY_ENV: &str = "GATEWAY_API_KEY";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "solace.toml")]
    config: String,

    /// Check database connectivity and exit
    #[arg(long)]
    health: bool,

    /// Keep sessions in process memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let mut config = match SolaceConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    config.gateway.api_key = std::env::var(GATEWAY_API_KEY_ENV).unwrap_or_default();

    let (store, pool) = if args.in_memory {
        tracing::warn!("Using in-memory store; sessions are lost on restart");
        let store: Arc<dyn MessageStore> = Arc::new(MemoryMessageStore::new());
        (store, None)
    } else {
        let pool = match solace_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        if args.health {
            match solace_core::db::health_check(&pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
            println!("✅ Solace DB health check passed");
            return Ok(());
        }

        solace_core::db::run_migrations(&pool).await?;
        let store: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(pool.clone()));
        (store, Some(pool))
    };

    // A missing credential does not stop the server; every chat request
    // answers with a configuration error until it is supplied.
    let gateway: Option<Arc<dyn CompletionGateway>> = match GatewayClient::new(config.gateway.clone()) {
        Ok(client) => {
            tracing::info!(model = client.model(), base_url = %config.gateway.base_url, "Gateway client ready");
            let client: Arc<dyn CompletionGateway> = Arc::new(client);
            Some(client)
        }
        Err(GatewayError::MissingApiKey) => {
            tracing::error!("{} is not set; chat requests will fail", GATEWAY_API_KEY_ENV);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let handler = ChatHandler::new(HandlerSettings::from(&config.handler), gateway, store.clone());
    tracing::info!(
        store = store.name(),
        persist_crisis_replies = config.handler.persist_crisis_replies,
        "Chat handler configured"
    );

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(HttpState::new(handler, pool), &config, tx.subscribe()).await
}
