//! Fetch the upstream newswire once and write a `raw/` snapshot to the configured store.
//!
//! Useful as a cron job or to seed a local `fs` store before starting the service.

use std::sync::Arc;

use news_galore::config::news::StoreKind;
use news_galore::ingest::providers::NytNewswire;
use news_galore::ingest::types::FeedSource;
use news_galore::publish::SnapshotPublisher;
use news_galore::store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};
use news_galore::NewsConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    news_galore::telemetry::init_tracing();

    let cfg = NewsConfig::load_default()?;
    let store: Arc<dyn ObjectStore> = match cfg.store.kind {
        StoreKind::Fs => Arc::new(LocalFsObjectStore::new(&cfg.store.root, cfg.store.bucket.clone())?),
        StoreKind::Memory => {
            tracing::warn!("store kind is `memory`; the snapshot is discarded when this process exits");
            Arc::new(InMemoryObjectStore::new(cfg.store.bucket.clone()))
        }
    };

    let source = NytNewswire::new(
        cfg.provider.url.clone(),
        cfg.provider.api_key.clone(),
        cfg.provider_timeout(),
    )?;
    let snapshot = source.fetch().await?;

    let publisher = SnapshotPublisher::new(store, cfg.publish_timeout());
    let key = publisher.publish_raw(&snapshot).await?;

    tracing::info!(target: "publish", key = %key, items = snapshot.len(), "snapshot written");
    println!("{key}");
    Ok(())
}
