//! `mandir-api` binary.
//!
//! Runs under the Lambda runtime by default. For local work:
//!
//!   RUST_LOG=info cargo run -- --mode serve --store memory
//!
//! Try:
//!   curl -X POST http://localhost:3000/leaderInfo \
//!        -d '{"mandirName":"Edison","phone":"555"}'
//!   curl 'http://localhost:3000/leaderInfo?mandirName=Edison'
//!   curl http://localhost:3000/kids

use std::sync::Arc;

use clap::Parser;
use lambda_runtime::{LambdaEvent, service_fn};
use mandir_api::store::{DynamoStore, KeyValueStore};
use mandir_api::{App, Config, Envelope, Event, RunMode, Server, StoreBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    config.validate()?;

    let catalog = config.catalog();
    let store: Arc<dyn KeyValueStore> = match config.store {
        StoreBackend::Dynamodb => Arc::new(
            DynamoStore::connect(&config.region, config.endpoint_url.as_deref()).await,
        ),
        StoreBackend::Memory => Arc::new(catalog.memory_store()),
    };

    let app = Arc::new(
        App::new(store, catalog, config.surface).with_max_scan_pages(config.max_scan_pages),
    );
    info!(surface = ?config.surface, store = ?config.store, mode = ?config.mode, "starting");

    match config.mode {
        RunMode::Lambda => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<Event>| {
                let app = Arc::clone(&app);
                async move { Ok::<Envelope, lambda_runtime::Error>(app.handle(event.payload).await) }
            }))
            .await
        }
        RunMode::Serve => {
            Server::bind(config.listen).serve(app).await?;
            Ok(())
        }
    }
}
