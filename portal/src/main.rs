//! Fritz Portal Server Entry Point

use clap::Parser;
use fritz_portal::auth::bootstrap::create_superadmin_from_env;
use fritz_portal::auth::session::SessionSettings;
use fritz_portal::cli::{user, Cli, Commands};
use fritz_portal::config::PortalConfig;
use fritz_portal::db::migrations::initialize_database;
use fritz_portal::notify::Notifier;
use fritz_portal::session_secret::get_or_create_session_secret;
use fritz_portal::{api, logging, AppState};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("failed to initialize logging: {}", e);
    }

    let config = PortalConfig::from_env();
    let pool = open_database(&config.database_url).await;

    match cli.command {
        Some(Commands::User { command }) => match user::run(command, &pool).await {
            Ok(lines) => lines.iter().for_each(|line| println!("{}", line)),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => run_server(config, pool).await,
    }
}

async fn open_database(database_url: &str) -> SqlitePool {
    if let Some(parent) = sqlite_parent_dir(database_url) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create data directory {}: {}", parent.display(), e);
            std::process::exit(1);
        }
    }

    match initialize_database(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    }
}

/// `sqlite:/path/to/portal.db` の親ディレクトリ（メモリDBは対象外）
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}

async fn run_server(config: PortalConfig, pool: SqlitePool) {
    info!("Fritz Portal v{}", env!("CARGO_PKG_VERSION"));

    match create_superadmin_from_env(&pool).await {
        Ok(Some(email)) => info!("Bootstrap superadmin ready: {}", email),
        Ok(None) => {}
        Err(e) => {
            error!("Failed to create bootstrap superadmin: {}", e);
            std::process::exit(1);
        }
    }

    let secret = match get_or_create_session_secret() {
        Ok(secret) => secret,
        Err(e) => {
            error!("Failed to load session secret: {}", e);
            std::process::exit(1);
        }
    };

    let sessions = SessionSettings {
        secret,
        ttl: chrono::Duration::hours(config.session_ttl_hours),
        secure_cookies: config.secure_cookies,
    };
    let notifier = Notifier::new(&config);
    if !notifier.is_enabled() {
        info!("Resend API key not set, notifications will only be logged");
    }

    let state = AppState::new(pool, sessions, notifier);
    let app = api::create_router(state);

    let bind_addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    info!("Portal server listening on {}", bind_addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
