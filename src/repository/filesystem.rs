// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use crate::config::app::AppConfig;
use crate::driver::{AsyncInputStream, ReadOutcome, StoredBlob, UploadSink};
use crate::error::error_kind::ErrorKind;
use crate::error::store::StoreError;

const DIGEST_FOLDER:&str = "sha256";

/// Uploads started by this process, shared by every storage so tmp names never collide
static UPLOADS: AtomicU64 = AtomicU64::new(0);

/// Stores uploaded blobs on the local filesystem, addressed by their sha256
pub struct FilesystemStorage {
    app_config: AppConfig,
}

#[async_trait]
impl UploadSink for FilesystemStorage {

    async fn upload(&self, source: &mut (dyn AsyncInputStream + Send)) -> Result<StoredBlob, StoreError> {
        // An empty read buffer would never make progress on the source
        if self.app_config.stream.read_buffer_size == 0 {
            if let Err(e) = source.close().await {
                tracing::warn!("Failed to close upload stream: {}", e);
            }
            return Err(StoreError::new(ErrorKind::ConfigError)
                .with_context("stream.read_buffer_size must be greater than zero"));
        }

        let file_path_tmp = self.blob_path_tmp();

        let result = self.persist(source, &file_path_tmp).await;

        // The source is released whatever happened to the upload
        if let Err(e) = source.close().await {
            tracing::warn!("Failed to close upload stream: {}", e);
        }

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&file_path_tmp).await {
                tracing::error!("Failed to remove partial upload {:?}: {}", file_path_tmp, e.to_string());
            }
        }

        result
    }
}

impl FilesystemStorage {

    /// New instance of the FilesystemStorage
    pub fn new(app_config: AppConfig) -> FilesystemStorage {
        FilesystemStorage {
            app_config,
        }
    }

    /// Build the local blob path
    pub fn blob_path(&self, digest: &str) -> PathBuf {
        self.digest_folder().join(digest)
    }

    /// Build a tmp path no other upload of this process uses
    fn blob_path_tmp(&self) -> PathBuf {
        let upload = UPLOADS.fetch_add(1, Ordering::Relaxed);
        self.digest_folder().join(format!("{}_{}_tmp", std::process::id(), upload))
    }

    fn digest_folder(&self) -> PathBuf {
        PathBuf::from(&self.app_config.storage.folder).join(DIGEST_FOLDER)
    }

    /// Pull the source into a tmp file, then move it to its digest path
    async fn persist(&self, source: &mut (dyn AsyncInputStream + Send), file_path_tmp: &Path) -> Result<StoredBlob, StoreError> {
        tokio::fs::create_dir_all(self.digest_folder()).await?;

        let mut file = self.open_file_for_write(file_path_tmp).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.app_config.stream.read_buffer_size];
        let mut size = 0u64;

        // Process the chunks coming from upstream and store them in the tmp file
        loop {
            match source.read(&mut buffer).await? {
                ReadOutcome::Read(count) => {
                    let chunk = &buffer[..count];
                    file.write_all(chunk).await?;
                    hasher.update(chunk);
                    size += count as u64;
                }
                ReadOutcome::EndOfStream => break,
            }
        }

        // Sync all the data to disk before exposing it under its final name
        file.flush().await?;
        file.sync_data().await.map_err(|e| StoreError::new(ErrorKind::StorageError)
            .with_context("failed to sync blob to disk")
            .with_error(e.to_string()))?;

        let digest = hex::encode(hasher.finalize());
        let file_path_final = self.blob_path(&digest);

        tokio::fs::rename(file_path_tmp, &file_path_final).await.map_err(|e| StoreError::new(ErrorKind::StorageError)
            .with_context(format!("failed to move blob to {:?}", file_path_final))
            .with_error(e.to_string()))?;

        tracing::info!("Blob stored successfully: {} ({} bytes)", digest, size);

        Ok(StoredBlob { digest, size })
    }

    /// Get an async write/create File handle
    async fn open_file_for_write(&self, file_path: &Path) -> Result<File, std::io::Error> {
        // Create the file options
        let mut options = OpenOptions::new();

        // We need to have a reference otherwise the Options get freed
        let options = options.write(true).create(true).truncate(true);

        // Now open the file
        options.open(file_path).await
    }
}
