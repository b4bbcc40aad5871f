// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use crate::error::store::StoreError;

/// Result of a single incremental read
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReadOutcome {
    /// Bytes copied into the destination, zero does not mean the stream ended
    Read(usize),

    /// No more data will ever be read
    EndOfStream,
}

/// Asynchronous stream of bytes read incrementally into caller buffers
#[async_trait]
pub trait AsyncInputStream {
    /// Read the next bytes into `dst`
    async fn read(&mut self, dst: &mut [u8]) -> Result<ReadOutcome, StoreError>;

    /// Close the stream, releasing its source
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// A stored object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StoredBlob {
    /// Hex encoded sha256 of the content
    pub digest: String,

    /// Size in bytes
    pub size: u64,
}

/// Interface for storing uploaded blobs
#[async_trait]
pub trait UploadSink {
    /// Pull `source` until it ends and persist its content
    async fn upload(&self, source: &mut (dyn AsyncInputStream + Send)) -> Result<StoredBlob, StoreError>;
}
