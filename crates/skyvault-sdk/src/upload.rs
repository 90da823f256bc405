//! The chunked upload pipeline
//!
//! A single reader task cuts the source into 1 MiB plaintext windows and
//! feeds a streaming SHA-512; up to [`MAX_UPLOADERS`] tasks encrypt and
//! POST chunks concurrently behind a semaphore. The first successful chunk
//! response supplies the storage bucket and region; `upload/done` is only
//! issued once every chunk task has finished. Any task failure cancels the
//! shared handle with its error, and that cause is what the caller gets.

use crate::{
    error::{cancelled_error, Error, Result},
    session::Drive,
    types::{File, IncompleteFile},
};
use bytes::Bytes;
use sha2::{Digest, Sha512};
use skyvault_client::cancel::CancelCause;
use skyvault_client::{api, Cancel};
use skyvault_crypto::{random_alnum_string, NONCE_SIZE, TAG_SIZE};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, instrument};

/// Plaintext chunk size: 1 MiB.
pub const CHUNK_SIZE: usize = 1_048_576;

/// Upper bound on concurrently running chunk uploads.
const MAX_UPLOADERS: usize = 16;

impl Drive {
    /// Upload a file's content from an async reader and finalize it.
    ///
    /// Returns the completed [`File`]; its size and chunk count come from
    /// the bytes actually read, not the server's echo.
    #[instrument(skip(self, ctx, reader), fields(name = %file.name))]
    pub async fn upload_file<R>(
        &self,
        ctx: &Cancel,
        file: &IncompleteFile,
        mut reader: R,
    ) -> Result<File>
    where
        R: AsyncRead + Unpin,
    {
        let ctx = ctx.child();
        let upload_key = random_alnum_string(32);
        let semaphore = Arc::new(Semaphore::new(MAX_UPLOADERS));
        let mut uploads = JoinSet::new();
        // only the first successful response's bucket/region matter
        let (placement_tx, mut placement_rx) = mpsc::channel::<api::UploadChunkResponse>(1);

        let mut hasher = Sha512::new();
        let mut size: u64 = 0;

        for index in 0u64.. {
            let data = match read_window(&mut reader, &ctx, index).await? {
                Some(data) => data,
                None => break,
            };
            size += data.len() as u64;
            hasher.update(&data);

            let permit = tokio::select! {
                _ = ctx.cancelled() => return Err(cancelled_error(&ctx)),
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("semaphore is never closed")
                }
            };

            let drive = self.clone();
            let ctx_task = ctx.clone();
            let file_task = file.clone();
            let upload_key_task = upload_key.clone();
            let placement = placement_tx.clone();
            uploads.spawn(async move {
                let _permit = permit;
                match upload_chunk(&drive, &ctx_task, &file_task, index, &upload_key_task, data)
                    .await
                {
                    Ok(response) => {
                        let _ = placement.try_send(response);
                    }
                    Err(Error::Aborted) => {}
                    Err(e) => ctx_task.cancel_with(Arc::new(e) as CancelCause),
                }
            });
        }
        drop(placement_tx);

        while uploads.join_next().await.is_some() {}

        if ctx.is_cancelled() {
            return Err(cancelled_error(&ctx));
        }

        let content_hash = hex::encode(hasher.finalize());
        if size == 0 {
            return self.finalize_empty(&ctx, file, &content_hash).await;
        }

        let placement = placement_rx.try_recv().map_err(|_| Error::NoChunksUploaded)?;
        self.finalize(&ctx, file, &upload_key, size, &content_hash, placement)
            .await
    }

    /// Issue `upload/done` and assemble the completed file record.
    async fn finalize(
        &self,
        ctx: &Cancel,
        file: &IncompleteFile,
        upload_key: &str,
        size: u64,
        content_hash: &str,
        placement: api::UploadChunkResponse,
    ) -> Result<File> {
        let chunks = size / CHUNK_SIZE as u64 + 1;
        let metadata = self.file_metadata_json(file, size, content_hash)?;

        let request = api::UploadDoneRequest {
            uuid: file.uuid.clone(),
            name: file.key.encrypt_meta(&file.name)?,
            name_hashed: self.hash_name(&file.name),
            size: size.to_string(),
            chunks,
            mime: self.encrypt_meta(&file.mime)?,
            rm: random_alnum_string(32),
            metadata: self.encrypt_meta(&metadata)?,
            version: self.auth_version(),
            upload_key: upload_key.to_string(),
        };
        let response = api::post_upload_done(self.transport(), ctx, &request).await?;
        debug!(size, chunks, "upload finalized");
        if response.size != 0 && response.size != size {
            return Err(Error::ServerInconsistency(format!(
                "upload/done echoed size {}, uploaded {size}",
                response.size
            )));
        }

        Ok(File {
            info: file.clone(),
            size,
            favorited: false,
            region: placement.region,
            bucket: placement.bucket,
            chunks,
            hash: Some(content_hash.to_string()),
        })
    }

    /// The zero-byte short path: no chunks, no upload key, `upload/empty`.
    async fn finalize_empty(
        &self,
        ctx: &Cancel,
        file: &IncompleteFile,
        content_hash: &str,
    ) -> Result<File> {
        let metadata = self.file_metadata_json(file, 0, content_hash)?;
        let request = api::UploadEmptyRequest {
            uuid: file.uuid.clone(),
            name: self.encrypt_meta(&file.name)?,
            name_hashed: self.hash_name(&file.name),
            size: "0".to_string(),
            parent: file.parent_uuid.clone(),
            mime: self.encrypt_meta(&file.mime)?,
            metadata: self.encrypt_meta(&metadata)?,
            version: self.auth_version(),
        };
        api::post_upload_empty(self.transport(), ctx, &request).await?;

        Ok(File {
            info: file.clone(),
            size: 0,
            favorited: false,
            region: String::new(),
            bucket: String::new(),
            chunks: 0,
            hash: Some(content_hash.to_string()),
        })
    }

    fn file_metadata_json(
        &self,
        file: &IncompleteFile,
        size: u64,
        content_hash: &str,
    ) -> Result<String> {
        let metadata = crate::dirs::FileMetadata {
            name: file.name.clone(),
            size,
            mime: file.mime.clone(),
            key: file.key.to_stored_string(self.auth_version()),
            last_modified: file.last_modified.timestamp_millis(),
            created: file.created.timestamp_millis(),
            hash: Some(content_hash.to_string()),
        };
        Ok(serde_json::to_string(&metadata)?)
    }
}

/// Read one plaintext window of up to [`CHUNK_SIZE`] bytes.
///
/// The buffer is over-allocated by the AEAD overhead so sealing never
/// reallocates. Returns `None` at EOF; a short read error cancels the
/// shared handle with the real cause.
async fn read_window<R>(reader: &mut R, ctx: &Cancel, index: u64) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::with_capacity(CHUNK_SIZE + NONCE_SIZE + TAG_SIZE);
    data.resize(CHUNK_SIZE, 0);

    let mut filled = 0;
    while filled < CHUNK_SIZE {
        if ctx.is_cancelled() {
            return Err(cancelled_error(ctx));
        }
        match reader.read(&mut data[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => {
                let err: CancelCause = Arc::new(Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("read chunk {index}: {e}"),
                )));
                ctx.cancel_with(err.clone());
                return Err(Error::Cancelled { cause: err });
            }
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    data.truncate(filled);
    Ok(Some(data))
}

/// Encrypt and POST a single chunk.
async fn upload_chunk(
    drive: &Drive,
    ctx: &Cancel,
    file: &IncompleteFile,
    index: u64,
    upload_key: &str,
    data: Vec<u8>,
) -> Result<api::UploadChunkResponse> {
    let sealed = file.key.encrypt_data(&data)?;
    api::upload_chunk(
        drive.transport(),
        ctx,
        &file.uuid,
        index,
        &file.parent_uuid,
        upload_key,
        Bytes::from(sealed),
    )
    .await
    .map_err(Into::into)
}
