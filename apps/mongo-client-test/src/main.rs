use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::mongodb::{EventDispatcher, connect_from_config, resolve_database};
use mongo_client_test::{
    DRIVER_VERSION,
    config::{Cli, Config},
    events::{
        ConnectionState, ConnectionStateListener, HeartbeatListener, ServerListener,
        TopologyListener,
    },
    poller::Poller,
    samples::{MongoSampleRepository, ensure_collection_not_empty},
    server, shutdown,
};
use observability::{MetricsLabels, init_metrics, spawn_upkeep};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main(flavor = "multi_thread", worker_threads = 5)]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    let config = Config::load(Cli::parse())?;

    init_tracing(&config.log);

    let metrics = init_metrics(&MetricsLabels::new(DRIVER_VERSION))?;
    spawn_upkeep(metrics, Duration::from_secs(5));

    let shutdown = shutdown::listen_for_signals();

    // Metrics are served before the connection attempt so a hanging
    // connect still shows up in scrapes
    let listener = server::bind(&config.server).await?;
    let mut server = tokio::spawn(server::serve(listener, shutdown.clone()));

    let state = Arc::new(ConnectionState::new());
    let dispatcher = EventDispatcher::new()
        .with_listener(ServerListener)
        .with_listener(HeartbeatListener)
        .with_listener(TopologyListener::new())
        .with_listener(ConnectionStateListener::new(Arc::clone(&state)));

    info!("Connecting to MongoDB at {}", config.mongodb.target());
    let client = connect_from_config(&config.mongodb, Some(dispatcher.into_handler())).await?;
    let db = resolve_database(&client, &config.mongodb)?;

    info!(
        database = %db.name(),
        collection = %config.collection,
        "Successfully connected to MongoDB"
    );

    let repo = Arc::new(MongoSampleRepository::new(db, config.collection.clone()));
    ensure_collection_not_empty(repo.as_ref()).await?;

    let poller = Arc::new(Poller::new(repo, state, config.poller.clone()));
    let poll = poller.run(shutdown.clone());
    tokio::pin!(poll);
    tokio::select! {
        () = &mut poll => server.await??,
        served = &mut server => {
            served??;
            if !*shutdown.borrow() {
                eyre::bail!("Metrics server stopped before shutdown");
            }
            poll.await;
        }
    }

    info!("Shutting down: closing MongoDB connections");
    client.shutdown().await;
    info!("MongoDB client test shutdown complete");
    Ok(())
}
