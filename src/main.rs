//! Portfolio Backend
//! Mission: Serve auth, contact messages, and the memories gallery behind
//! token, role, and rate-limit gates

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_backend::{
    api::{create_router, AppState, Gates},
    auth::{AuthGate, JwtHandler, UserStore},
    config::ServerConfig,
    memories::MemoryStore,
    messages::MessageStore,
    middleware::{RateLimitStore, RateLimiter},
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = ServerConfig::parse();

    info!("🚀 Portfolio backend starting");

    let (jwt_secret, is_dev_secret) = config.jwt_secret();
    if is_dev_secret {
        warn!("⚠️  JWT_SECRET not set, using the development secret. SET IT IN PRODUCTION!");
    }
    let jwt_handler = Arc::new(JwtHandler::with_expiration_hours(
        jwt_secret,
        config.jwt_expire_hours,
    ));

    let users = Arc::new(UserStore::new(&config.database_path)?);
    if let Some((username, password)) = config.admin_account() {
        users.ensure_admin(username, password)?;
    }
    let messages = Arc::new(MessageStore::new(&config.database_path)?);
    let memories = Arc::new(MemoryStore::new(&config.database_path)?);
    info!("💾 Database ready at: {}", config.database_path);

    let gates = Gates {
        auth: AuthGate::new(jwt_handler.clone(), users.clone())
            .with_lookup_timeout(config.identity_lookup_timeout()),
        message_limiter: RateLimiter::new(config.message_rate_limit(), RateLimitStore::new()),
    };
    let limit = gates.message_limiter.config();
    info!(
        "🚦 Message submissions limited to {} per {}s per address",
        limit.max_requests,
        limit.window.as_secs()
    );

    let state = AppState {
        users,
        jwt_handler,
        messages,
        memories,
    };

    let app = create_router(state, gates)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_backend=debug,portfolio=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate directory
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
