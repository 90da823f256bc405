//! The logical directory model
//!
//! Paths are purely a client-side notion: the server only knows opaque
//! UUIDs and encrypted names. Every path operation therefore walks the tree
//! by listing directories and matching decrypted names, segment by segment.
//! Matching is plain string equality, case-sensitive.

use crate::{
    error::{Error, Result},
    session::Drive,
    types::{
        round_ms, timestamp_to_datetime, DirColor, DirEntry, Directory, File, FsObject,
        IncompleteFile,
    },
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use skyvault_client::{api, Cancel};
use skyvault_crypto::EncryptionKey;
use tracing::instrument;

/// The JSON object stored inside a file's metadata envelope.
///
/// `creation` is the current key for the created timestamp; older writers
/// used `created`, which is still accepted on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub mime: String,
    pub key: String,
    #[serde(rename = "lastModified", default)]
    pub last_modified: i64,
    #[serde(rename = "creation", alias = "created", default)]
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// The JSON object stored inside a directory's name envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DirectoryMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<i64>,
}

impl Drive {
    /// List a directory's children, decrypting all names and metadata.
    #[instrument(skip(self, ctx))]
    pub async fn read_directory(
        &self,
        ctx: &Cancel,
        dir: &DirEntry,
    ) -> Result<(Vec<File>, Vec<Directory>)> {
        let content = api::post_dir_content(self.transport(), ctx, dir.uuid()).await?;

        let mut files = Vec::with_capacity(content.uploads.len());
        for upload in content.uploads {
            let metadata_str = self.decrypt_meta(&upload.metadata)?;
            let metadata: FileMetadata = serde_json::from_str(&metadata_str)?;
            let key = EncryptionKey::from_unknown_string(&metadata.key)?;

            files.push(File {
                info: IncompleteFile {
                    uuid: upload.uuid,
                    name: metadata.name,
                    mime: metadata.mime,
                    key,
                    created: timestamp_to_datetime(metadata.created),
                    last_modified: timestamp_to_datetime(metadata.last_modified),
                    parent_uuid: upload.parent,
                },
                size: metadata.size,
                favorited: upload.favorited == 1,
                region: upload.region,
                bucket: upload.bucket,
                chunks: upload.chunks,
                hash: metadata.hash,
            });
        }

        let mut directories = Vec::with_capacity(content.folders.len());
        for folder in content.folders {
            let name_str = self.decrypt_meta(&folder.name)?;
            let metadata: DirectoryMetadata = serde_json::from_str(&name_str)?;
            // fall back to the server's timestamp when the metadata has no
            // usable creation time
            let created = match metadata.creation {
                Some(ms) if ms != 0 => timestamp_to_datetime(ms),
                _ => timestamp_to_datetime(folder.timestamp),
            };

            directories.push(Directory {
                uuid: folder.uuid,
                name: metadata.name,
                parent_uuid: folder.parent,
                color: DirColor::from_server(folder.color.as_deref()),
                created,
                favorited: folder.favorited == 1,
            });
        }

        Ok((files, directories))
    }

    /// Resolve a path to whatever it names: a file, a directory, or the
    /// root for the empty path. `None` if any segment is missing.
    ///
    /// Intermediate segments only match directories; a file with the same
    /// name as an intermediate segment is skipped, because the caller wants
    /// a container there.
    pub async fn find_item(&self, ctx: &Cancel, path: &str) -> Result<Option<FsObject>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Ok(Some(FsObject::Root(self.root())));
        }

        let mut current: DirEntry = self.root().into();
        for (idx, segment) in segments.iter().enumerate() {
            let last = idx == segments.len() - 1;
            let (files, directories) = self.read_directory(ctx, &current).await?;

            if last {
                if let Some(file) = files.into_iter().find(|f| f.info.name == *segment) {
                    return Ok(Some(FsObject::File(file)));
                }
            }
            match directories.into_iter().find(|d| d.name == *segment) {
                Some(dir) if last => return Ok(Some(FsObject::Directory(dir))),
                Some(dir) => current = dir.into(),
                None => return Ok(None),
            }
        }
        unreachable!("loop returns on the last segment")
    }

    /// Resolve a path to a directory; the empty path is the root.
    pub async fn find_directory(&self, ctx: &Cancel, path: &str) -> Result<Option<DirEntry>> {
        match self.find_item(ctx, path).await? {
            Some(FsObject::Directory(dir)) => Ok(Some(dir.into())),
            Some(FsObject::Root(root)) => Ok(Some(root.into())),
            Some(FsObject::File(_)) | None => Ok(None),
        }
    }

    /// Resolve a directory path, creating every missing segment.
    ///
    /// Once a segment is missing, each further segment is known absent and
    /// is created without listing.
    pub async fn find_or_create_directory(&self, ctx: &Cancel, path: &str) -> Result<DirEntry> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut current: DirEntry = self.root().into();
        let mut creating = false;
        for segment in segments {
            if !creating {
                let (_, directories) = self.read_directory(ctx, &current).await?;
                if let Some(dir) = directories.into_iter().find(|d| d.name == segment) {
                    current = dir.into();
                    continue;
                }
                creating = true;
            }
            current = self.create_directory(ctx, &current, segment).await?.into();
        }
        Ok(current)
    }

    /// Create a directory under the given parent.
    #[instrument(skip(self, ctx, parent))]
    pub async fn create_directory(
        &self,
        ctx: &Cancel,
        parent: &DirEntry,
        name: &str,
    ) -> Result<Directory> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let created = round_ms(Utc::now());

        let metadata = DirectoryMetadata {
            name: name.to_string(),
            creation: Some(created.timestamp_millis()),
        };
        let encrypted = self.encrypt_meta(&serde_json::to_string(&metadata)?)?;
        let name_hashed = self.hash_name(name);

        let response_uuid = api::post_dir_create(
            self.transport(),
            ctx,
            &uuid,
            &encrypted,
            &name_hashed,
            parent.uuid(),
        )
        .await?;
        if response_uuid != uuid {
            return Err(Error::ServerInconsistency(format!(
                "dir/create returned uuid {response_uuid}, sent {uuid}"
            )));
        }

        Ok(Directory {
            uuid,
            name: name.to_string(),
            parent_uuid: parent.uuid().to_string(),
            color: DirColor::Default,
            created,
            favorited: false,
        })
    }

    /// Move a file to the trash.
    pub async fn trash_file(&self, ctx: &Cancel, file: &File) -> Result<()> {
        Ok(api::post_file_trash(self.transport(), ctx, &file.info.uuid).await?)
    }

    /// Move a directory to the trash.
    pub async fn trash_directory(&self, ctx: &Cancel, dir: &Directory) -> Result<()> {
        Ok(api::post_dir_trash(self.transport(), ctx, &dir.uuid).await?)
    }

    /// Permanently delete a file. Irreversible.
    pub async fn permanent_delete_file(&self, ctx: &Cancel, uuid: &str) -> Result<()> {
        Ok(api::post_file_delete_permanent(self.transport(), ctx, uuid).await?)
    }

    /// Permanently delete a directory. Irreversible.
    pub async fn permanent_delete_directory(&self, ctx: &Cancel, uuid: &str) -> Result<()> {
        Ok(api::post_dir_delete_permanent(self.transport(), ctx, uuid).await?)
    }

    /// Rewrite a file's name and metadata envelopes after a local change to
    /// the metadata triple (name, mime, timestamps).
    pub async fn update_meta(&self, ctx: &Cancel, file: &File) -> Result<()> {
        let metadata = FileMetadata {
            name: file.info.name.clone(),
            size: file.size,
            mime: file.info.mime.clone(),
            key: file.info.key.to_stored_string(self.auth_version()),
            last_modified: file.info.last_modified.timestamp_millis(),
            created: file.info.created.timestamp_millis(),
            hash: file.hash.clone(),
        };
        let metadata_encrypted = self.encrypt_meta(&serde_json::to_string(&metadata)?)?;
        let name_encrypted = file.info.key.encrypt_meta(&file.info.name)?;
        let name_hashed = self.hash_name(&file.info.name);

        Ok(api::post_file_metadata(
            self.transport(),
            ctx,
            &file.info.uuid,
            &name_encrypted,
            &name_hashed,
            &metadata_encrypted,
        )
        .await?)
    }
}
