use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use catalog_sync::cli::{parse_command, print_usage, Command};
use catalog_sync::clients::EmbeddingsServiceClient;
use catalog_sync::config::Config;
use catalog_sync::handlers::JsonArrayHandler;
use catalog_sync::storage::{connect_database, MongoCatalogStore};
use catalog_sync::sync::SyncEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load this crate's .env regardless of current working directory, and override any pre-set envs
    let _ = dotenvy::from_filename_override(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    let filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(std::io::stderr)
        .init();

    let (target, input) = match parse_command(std::env::args().skip(1)) {
        Ok(Command::Sync { target, input }) => (target, input),
        Ok(Command::Help) => {
            print_usage();
            return Ok(());
        }
        Err(message) => {
            eprintln!("error: {}", message);
            print_usage();
            std::process::exit(2);
        }
    };

    let cfg = Config::from_env();
    let profile = target.profile(&cfg);
    tracing::info!(
        database = %cfg.database_name,
        profile = %profile.name,
        collection = %profile.collection,
        input = %input.display(),
        "Loaded configuration"
    );

    let db = connect_database(&cfg).await?;
    let store = MongoCatalogStore::with_db(db, &profile.collection);
    let embeddings_client = EmbeddingsServiceClient::new(
        cfg.embeddings_service_url.clone(),
        cfg.http_timeout_ms,
        cfg.embedding_dimension,
    )?;
    let engine = SyncEngine::new(Arc::new(store), Arc::new(embeddings_client))
        .with_embedding_parallelism(cfg.embedding_parallelism);

    let records = JsonArrayHandler::with_capacity(cfg.record_channel_capacity).open(&input)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing buffered writes");
            on_signal.cancel();
        }
    });

    let summary = engine.execute_sync_cancellable(&profile, records, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
