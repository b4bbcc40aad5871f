// SPDX-License-Identifier: Apache-2.0
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use crate::error::store::StoreError;

const CONFIG_FILE_NAME:&str = "config.yaml";
const ENV_PREFIX:&str = "IMAGE_STORE";

/// Configuration for the image store
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

impl AppConfig {

    /// Load a specific Application Config, environment variables prefixed with
    /// `IMAGE_STORE__` override the file values
    pub fn load_file(source: &str) -> Result<AppConfig, StoreError> {
        let config = Config::builder()
            .add_source(File::with_name(source))
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__").try_parsing(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load the default config file: config.yaml
    pub fn load() -> Result<AppConfig, StoreError> {
        AppConfig::load_file(CONFIG_FILE_NAME)
    }

    /// Parse an inline YAML document
    pub fn from_yaml(yaml: &str) -> Result<AppConfig, StoreError> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Whether the AppConfig is valid
    pub fn is_valid(&self) -> bool {

        if self.storage.folder.is_empty() {
            tracing::error!("config.yaml has an empty storage->folder");
            return false;
        }

        if self.stream.chunk_size == 0 {
            tracing::error!("config.yaml has a zero stream->chunk_size");
            return false;
        }

        if self.stream.read_buffer_size == 0 {
            tracing::error!("config.yaml has a zero stream->read_buffer_size");
            return false;
        }

        true
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageConfig {
    /// Root folder of the stored images
    pub folder: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StreamConfig {

    /// Size of the chunks pushed by the upload producer
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Size of the buffer the storage sink reads into
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_read_buffer_size() -> usize {
    8192
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            chunk_size: default_chunk_size(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}
