// SPDX-License-Identifier: Apache-2.0
use futures_util::TryStreamExt;
use tokio_util::io::ReaderStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use image_store::config::app::AppConfig;
use image_store::driver::{StoredBlob, UploadSink};
use image_store::error::error_kind::ErrorKind;
use image_store::error::store::StoreError;
use image_store::pubsub::adapter::PushPullAdapter;
use image_store::pubsub::observer::TracingObserver;
use image_store::repository::filesystem::FilesystemStorage;
use image_store::stream::reader::ChunkedByteReader;

#[tokio::main]
async fn main() -> std::io::Result<()> {

    // Logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "image_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get access to the config
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            e.log();
            return Ok(());
        }
    };
    if !config.is_valid() {
        return Ok(tracing::error!("invalid config.yaml"));
    }

    let storage = FilesystemStorage::new(config.clone());

    // Every argument is an image to store
    for path in std::env::args().skip(1) {
        match store_image(&storage, &config, &path).await {
            Ok(blob) => tracing::info!("Stored {} as {} ({} bytes)", path, blob.digest, blob.size),
            Err(e) => tracing::error!("Unable to store {}: {}", path, e),
        }
    }

    tracing::info!("Shutdown completed");

    Ok(())
}

/// Push the file as chunks through the pull adapter into the storage
async fn store_image(storage: &FilesystemStorage, config: &AppConfig, path: &str) -> Result<StoredBlob, StoreError> {
    let file = tokio::fs::File::open(path).await?;
    let chunks = ReaderStream::with_capacity(file, config.stream.chunk_size)
        .map_err(|e| StoreError::new(ErrorKind::ProducerError)
            .with_context("failed to read image")
            .with_error(e.to_string()));

    let observer = TracingObserver::new(tracing::debug_span!("upload", image = %path));
    let mut source = ChunkedByteReader::new(PushPullAdapter::subscribe(chunks, observer));

    storage.upload(&mut source).await
}
