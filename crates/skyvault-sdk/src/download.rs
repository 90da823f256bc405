//! The chunked download pipeline
//!
//! A sliding window of up to eight chunk slots is prefetched concurrently;
//! the reader consumes chunks strictly in index order. Each slot is a
//! single-producer single-consumer cell guarded by its own async mutex: a
//! fetch task locks the slot before it is spawned and releases it once the
//! decrypted chunk is in place, so a reader blocked on the lock wakes
//! exactly when its chunk is ready. When the reader finishes a slot it
//! schedules the next chunk beyond the window into the same slot.
//!
//! Every delivered byte feeds a streaming SHA-512; on a complete read,
//! `close` compares it against the hash recorded in the file metadata.
//! Ranged readers skip the hash check.

use crate::{
    error::{cancelled_error, Error, Result},
    session::Drive,
    types::File,
    upload::CHUNK_SIZE,
};
use sha2::{Digest, Sha512};
use skyvault_client::cancel::CancelCause;
use skyvault_client::{api, Cancel};
use skyvault_crypto::random_alnum_string;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

/// Number of chunk slots kept in memory.
const MAX_BUFFER_SIZE: u64 = 8;

#[derive(Default)]
struct ChunkSlot {
    data: Vec<u8>,
}

/// Sequential reader over an encrypted chunked file.
pub struct ChunkedReader {
    drive: Drive,
    file: Arc<File>,
    ctx: Cancel,
    slots: Vec<Arc<Mutex<ChunkSlot>>>,
    /// Index of the chunk currently being consumed
    chunk_index: u64,
    /// One past the last chunk holding data (`ceil(size / CHUNK_SIZE)`)
    end_chunk: u64,
    offset_in_chunk: usize,
    /// Bytes left to deliver for ranged reads
    remaining: Option<u64>,
    delivered: u64,
    hasher: Option<Sha512>,
}

impl ChunkedReader {
    fn new(drive: Drive, ctx: &Cancel, file: &File, offset: u64, limit: Option<u64>) -> Self {
        let data_chunks = file.size.div_ceil(CHUNK_SIZE as u64);
        let start_chunk = offset / CHUNK_SIZE as u64;
        let window = MAX_BUFFER_SIZE.min(data_chunks.saturating_sub(start_chunk)) as usize;

        let mut reader = Self {
            drive,
            file: Arc::new(file.clone()),
            ctx: ctx.child(),
            slots: (0..window).map(|_| Arc::new(Mutex::new(ChunkSlot::default()))).collect(),
            chunk_index: start_chunk,
            end_chunk: data_chunks,
            offset_in_chunk: (offset % CHUNK_SIZE as u64) as usize,
            remaining: limit,
            delivered: 0,
            hasher: limit.is_none().then(Sha512::new),
        };
        for i in 0..window as u64 {
            reader.spawn_fetch(start_chunk + i);
        }
        reader
    }

    /// Reserve the target slot and fetch a chunk into it in the background.
    fn spawn_fetch(&self, chunk_index: u64) {
        if chunk_index >= self.end_chunk || self.slots.is_empty() {
            return;
        }
        let slot = self.slots[(chunk_index % self.slots.len() as u64) as usize].clone();
        // the scheduling discipline guarantees the slot is free here; a
        // held lock means corrupted reader state
        let mut guard = slot.try_lock_owned().expect("chunk slot is free when scheduled");

        let drive = self.drive.clone();
        let file = self.file.clone();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            match fetch_and_decrypt(&drive, &ctx, &file, chunk_index).await {
                Ok(data) => {
                    if data.len() > CHUNK_SIZE {
                        ctx.cancel_with(Arc::new(Error::ChunkTooLarge {
                            index: chunk_index,
                            size: data.len(),
                        }) as CancelCause);
                        return;
                    }
                    guard.data = data;
                }
                // someone else cancelled; their cause stands
                Err(Error::Aborted) => {}
                Err(e) => ctx.cancel_with(Arc::new(e) as CancelCause),
            }
        });
    }

    fn advance_chunk(&mut self) {
        let next = self.chunk_index + self.slots.len() as u64;
        self.chunk_index += 1;
        self.offset_in_chunk = 0;
        self.spawn_fetch(next);
    }

    /// Copy up to `out.len()` plaintext bytes. `Ok(0)` is end of stream.
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut read = 0;
        while read < out.len() {
            if self.remaining == Some(0) || self.chunk_index >= self.end_chunk {
                break;
            }
            if self.ctx.is_cancelled() {
                return Err(cancelled_error(&self.ctx));
            }

            let slot = self.slots[(self.chunk_index % self.slots.len() as u64) as usize].clone();
            let guard = tokio::select! {
                _ = self.ctx.cancelled() => return Err(cancelled_error(&self.ctx)),
                guard = slot.lock() => guard,
            };
            if self.ctx.is_cancelled() {
                return Err(cancelled_error(&self.ctx));
            }

            let available = guard.data.len().saturating_sub(self.offset_in_chunk);
            if available == 0 {
                drop(guard);
                self.advance_chunk();
                continue;
            }

            let mut n = available.min(out.len() - read);
            if let Some(rem) = self.remaining {
                n = n.min(rem as usize);
            }
            out[read..read + n]
                .copy_from_slice(&guard.data[self.offset_in_chunk..self.offset_in_chunk + n]);
            self.offset_in_chunk += n;
            let chunk_done = self.offset_in_chunk >= guard.data.len();
            drop(guard);

            read += n;
            self.delivered += n as u64;
            if let Some(rem) = &mut self.remaining {
                *rem -= n as u64;
            }
            if chunk_done {
                self.advance_chunk();
            }
        }

        if let Some(hasher) = &mut self.hasher {
            hasher.update(&out[..read]);
        }
        Ok(read)
    }

    /// Drain the remainder of the stream into a buffer.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 256 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Stop all fetches and, on a complete unranged read, verify the
    /// streamed SHA-512 against the file metadata.
    pub async fn close(&mut self) -> Result<()> {
        self.ctx.cancel();

        if self.delivered < self.file.size {
            // incomplete read, nothing to verify
            return Ok(());
        }
        if let (Some(hasher), Some(expected)) = (self.hasher.take(), self.file.hash.as_deref()) {
            if !expected.is_empty() {
                let actual = hex::encode(hasher.finalize());
                if actual != expected {
                    return Err(Error::HashMismatch {
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Drop for ChunkedReader {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

/// Download and decrypt one chunk with the file's content key.
async fn fetch_and_decrypt(
    drive: &Drive,
    ctx: &Cancel,
    file: &File,
    chunk_index: u64,
) -> Result<Vec<u8>> {
    let encrypted = api::download_chunk(
        drive.transport(),
        ctx,
        &file.region,
        &file.bucket,
        &file.info.uuid,
        chunk_index,
    )
    .await?;
    Ok(file.info.key.decrypt_data(&encrypted)?)
}

impl Drive {
    /// A sequential reader over the whole file, with end-of-stream
    /// integrity verification on `close`.
    pub fn download_reader(&self, ctx: &Cancel, file: &File) -> ChunkedReader {
        ChunkedReader::new(self.clone(), ctx, file, 0, None)
    }

    /// A reader over `limit` bytes starting at `offset`. Range reads skip
    /// the content hash check.
    pub fn download_reader_ranged(
        &self,
        ctx: &Cancel,
        file: &File,
        offset: u64,
        limit: u64,
    ) -> ChunkedReader {
        ChunkedReader::new(self.clone(), ctx, file, offset, Some(limit))
    }

    /// Download a file to a local path.
    ///
    /// The content streams into a temporary file next to the destination
    /// and is renamed into place only after the hash check passes.
    #[instrument(skip(self, ctx, file, path), fields(name = %file.info.name))]
    pub async fn download_to_path(
        &self,
        ctx: &Cancel,
        file: &File,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let tmp = dir.join(format!(".{}.{}.part", file.info.name, random_alnum_string(8)));

        match self.download_to_file(ctx, file, &tmp).await {
            Ok(()) => {
                tokio::fs::rename(&tmp, path).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e)
            }
        }
    }

    async fn download_to_file(&self, ctx: &Cancel, file: &File, path: &Path) -> Result<()> {
        let mut out = tokio::fs::File::create(path).await?;
        let mut reader = self.download_reader(ctx, file);
        let mut buf = vec![0u8; 256 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
        }
        reader.close().await?;
        out.flush().await?;
        out.sync_all().await?;
        Ok(())
    }
}
