use clap::{Parser, Subcommand};
use roster_core::config::RosterConfig;
use roster_notify::{HttpRelay, NullRelay, Relay};
use roster_store::{NewEvent, RosterStore};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod actions;
mod app;
mod auth;
mod http;
mod realtime;
#[cfg(test)]
mod test_support;
mod ws;

#[derive(Parser)]
#[command(name = "roster-gateway")]
#[command(about = "Live team rosters for scheduled matches")]
struct Cli {
    /// Config file (default: $ROSTER_CONFIG, then ~/.roster/roster.toml)
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP/WS gateway (default)
    Serve,
    /// Create events from a JSON file (one event or an array)
    Seed { file: PathBuf },
    /// Stop accepting roster changes for an event
    Close { event_id: String },
    /// List events
    List,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Many(Vec<NewEvent>),
    One(Box<NewEvent>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_gateway=info,roster_store=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > ROSTER_CONFIG env > ~/.roster/roster.toml
    let config_path = cli.config.or_else(|| std::env::var("ROSTER_CONFIG").ok());
    let config = RosterConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), error = %e, "config load failed, using defaults");
        RosterConfig::default()
    });

    let store = open_store(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::Seed { file } => seed(&store, &file),
        Command::Close { event_id } => {
            let event = store.close_event(&event_id)?;
            println!("closed {} ({})", event.id, event.description);
            Ok(())
        }
        Command::List => {
            for ev in store.list_events()? {
                println!(
                    "{}  {}  {:<6}  {:>3} players  v{}  {}",
                    ev.id,
                    ev.date.format("%Y-%m-%d %H:%M"),
                    ev.status.to_string(),
                    ev.players,
                    ev.version,
                    ev.description
                );
            }
            Ok(())
        }
    }
}

async fn serve(config: RosterConfig, store: RosterStore) -> anyhow::Result<()> {
    let relay = build_relay(&config).await;
    let broadcaster = Arc::new(realtime::ChannelHub::new(config.realtime.channel_capacity));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, store, broadcaster, relay));
    let router = app::build_router(state.clone());

    info!("Roster gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    state.disconnect_relay().await;
    Ok(())
}

/// HTTP relay when configured and valid, otherwise notifications are only logged.
async fn build_relay(config: &RosterConfig) -> Box<dyn Relay> {
    let Some(relay_config) = config.relay.clone() else {
        info!("no relay configured, group notifications disabled");
        return Box::new(NullRelay);
    };
    let mut relay = match HttpRelay::new(relay_config) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "relay setup failed, group notifications disabled");
            return Box::new(NullRelay);
        }
    };
    if let Err(e) = relay.connect().await {
        warn!(error = %e, "relay not ready, group notifications disabled");
        return Box::new(NullRelay);
    }
    Box::new(relay)
}

fn open_store(config: &RosterConfig) -> anyhow::Result<RosterStore> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
    roster_store::db::init_db(&db)?;
    info!("database migrations complete");

    Ok(RosterStore::new(db).with_default_team_limit(config.roster.team_limit))
}

fn seed(store: &RosterStore, file: &std::path::Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let events = match serde_json::from_str::<SeedFile>(&raw)? {
        SeedFile::Many(events) => events,
        SeedFile::One(event) => vec![*event],
    };
    for new in events {
        let event = store.create_event(new)?;
        println!("created {} ({})", event.id, event.description);
    }
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
