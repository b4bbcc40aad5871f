// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use bytes::Buf;
use crate::driver::{AsyncInputStream, ReadOutcome};
use crate::error::store::StoreError;
use crate::pubsub::adapter::PushPullAdapter;
use crate::pubsub::pending::Pulled;

/// Reads the chunks of a push producer as a byte stream
///
/// Every `read` copies bytes of at most one chunk. A chunk that does not fit the
/// destination is finished by the following reads before the next chunk is pulled.
pub struct ChunkedByteReader<T> {
    source: PushPullAdapter<T, StoreError>,
    partial: Option<T>,
}

impl<T> ChunkedByteReader<T>
    where
        T: Buf + Send + 'static,
{
    pub fn new(source: PushPullAdapter<T, StoreError>) -> Self {
        ChunkedByteReader {
            source,
            partial: None,
        }
    }

    /// Copy as much of `chunk` as fits, keeping the rest for the next read
    fn copy_chunk(&mut self, mut chunk: T, dst: &mut [u8]) -> usize {
        let count = chunk.remaining().min(dst.len());
        chunk.copy_to_slice(&mut dst[..count]);
        if chunk.has_remaining() {
            self.partial = Some(chunk);
        }
        count
    }
}

#[async_trait]
impl<T> AsyncInputStream for ChunkedByteReader<T>
    where
        T: Buf + Send + 'static,
{
    async fn read(&mut self, dst: &mut [u8]) -> Result<ReadOutcome, StoreError> {
        if let Some(chunk) = self.partial.take() {
            return Ok(ReadOutcome::Read(self.copy_chunk(chunk, dst)));
        }

        match self.source.request_next().await {
            Pulled::Item(chunk) => Ok(ReadOutcome::Read(self.copy_chunk(chunk, dst))),
            Pulled::EndOfStream => Ok(ReadOutcome::EndOfStream),
            Pulled::Failed(e) => Err(e),
        }
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.partial = None;
        self.source.dispose();
        Ok(())
    }
}
