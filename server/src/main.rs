mod config;
mod handlers;
mod job;
mod publisher;
mod runner;
mod sink;
mod state;
mod tracker;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::publisher::BroadcastPublisher;
use crate::sink::FileSink;
use crate::state::AppState;

const PROGRESS_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("server=debug,tower_http=info,axum=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(
        "config: output_dir={} tick={:?} stream_timeout={:?}",
        config.output_dir.display(),
        config.tick_interval,
        config.stream_timeout
    );

    let publisher = Arc::new(BroadcastPublisher::new(PROGRESS_CHANNEL_CAPACITY));
    let sink = Arc::new(FileSink::new(&config.output_dir));
    let bind_addr = config.bind_addr.clone();

    // relay de progreso al log, en segundo plano
    let mut progress_rx = publisher.subscribe();
    tokio::spawn(async move {
        loop {
            match progress_rx.recv().await {
                Ok((topic, event)) => debug!(
                    "{} -> {:?} logs={}",
                    topic, event.status, event.log_count
                ),
                Err(RecvError::Lagged(n)) => warn!("relay de progreso perdió {} eventos", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let state = AppState::new(config, sink, publisher);
    let app = handlers::build_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("servidor escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
