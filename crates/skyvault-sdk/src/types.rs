//! Cloud drive entities
//!
//! Everything on the drive is named by a server-assigned UUIDv4 string;
//! parent/child structure is plain UUID references, never an owned graph.
//! The root directory is a distinguished marker with no name and no parent,
//! deliberately not unifiable with [`Directory`].

use crate::error::Result;
use chrono::{DateTime, TimeZone, Utc};
use skyvault_crypto::EncryptionKey;
use std::path::Path;

/// A file that exists client-side but has not finished uploading.
#[derive(Clone, Debug, PartialEq)]
pub struct IncompleteFile {
    /// Client-generated UUID of the cloud item
    pub uuid: String,
    pub name: String,
    pub mime: String,
    /// The key that encrypts this file's content and name
    pub key: EncryptionKey,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// UUID of the parent directory
    pub parent_uuid: String,
}

impl IncompleteFile {
    /// Prepare a new file record with a fresh per-file key.
    ///
    /// v1/v2 sessions get an alphanumeric-ASCII key, v3 sessions a random
    /// 32-byte key. Timestamps are rounded to whole milliseconds, the
    /// resolution the metadata format round-trips.
    pub fn new(
        auth_version: u32,
        name: &str,
        mime: &str,
        created: DateTime<Utc>,
        last_modified: DateTime<Utc>,
        parent: &DirEntry,
    ) -> Self {
        let key = new_file_key(auth_version);
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            mime: infer_mime(name, mime),
            key,
            created: round_ms(created),
            last_modified: round_ms(last_modified),
            parent_uuid: parent.uuid().to_string(),
        }
    }

    /// Prepare a file record from a local file's name and timestamps.
    ///
    /// Platforms without a creation timestamp fall back to the modified
    /// time.
    pub async fn from_path(
        auth_version: u32,
        path: impl AsRef<Path>,
        parent: &DirEntry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        let modified: DateTime<Utc> = meta.modified()?.into();
        let created: DateTime<Utc> = meta.created().map(Into::into).unwrap_or(modified);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(auth_version, &name, "", created, modified, parent))
    }
}

/// Generate a per-file content key for the given auth version.
pub fn new_file_key(auth_version: u32) -> EncryptionKey {
    match auth_version {
        1 | 2 => EncryptionKey::generate_alnum(),
        _ => EncryptionKey::generate(),
    }
}

/// A fully uploaded file on the cloud drive.
#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub info: IncompleteFile,
    /// Plaintext size in bytes
    pub size: u64,
    pub favorited: bool,
    /// Storage region of the file's chunks
    pub region: String,
    /// Storage bucket of the file's chunks
    pub bucket: String,
    /// Server-accounted chunk count (`size / 1 MiB + 1` for non-empty files)
    pub chunks: u64,
    /// Hex SHA-512 of the plaintext, when recorded in metadata
    pub hash: Option<String>,
}

/// Directory list colors assignable in the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DirColor {
    #[default]
    Default,
    Blue,
    Green,
    Purple,
    Red,
    Gray,
}

impl DirColor {
    pub fn from_server(color: Option<&str>) -> Self {
        match color {
            Some("blue") => Self::Blue,
            Some("green") => Self::Green,
            Some("purple") => Self::Purple,
            Some("red") => Self::Red,
            Some("gray") => Self::Gray,
            _ => Self::Default,
        }
    }
}

/// A directory on the cloud drive.
#[derive(Clone, Debug, PartialEq)]
pub struct Directory {
    pub uuid: String,
    pub name: String,
    pub parent_uuid: String,
    pub color: DirColor,
    pub created: DateTime<Utc>,
    pub favorited: bool,
}

/// The account's root directory: a bare UUID, no name, no parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootDirectory {
    pub uuid: String,
}

/// Any object a path can resolve to.
#[derive(Clone, Debug, PartialEq)]
pub enum FsObject {
    File(File),
    Directory(Directory),
    Root(RootDirectory),
}

impl FsObject {
    pub fn uuid(&self) -> &str {
        match self {
            FsObject::File(f) => &f.info.uuid,
            FsObject::Directory(d) => &d.uuid,
            FsObject::Root(r) => &r.uuid,
        }
    }
}

/// A directory-shaped object: a real directory or the root marker.
#[derive(Clone, Debug, PartialEq)]
pub enum DirEntry {
    Directory(Directory),
    Root(RootDirectory),
}

impl DirEntry {
    pub fn uuid(&self) -> &str {
        match self {
            DirEntry::Directory(d) => &d.uuid,
            DirEntry::Root(r) => &r.uuid,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, DirEntry::Root(_))
    }
}

impl From<Directory> for DirEntry {
    fn from(d: Directory) -> Self {
        DirEntry::Directory(d)
    }
}

impl From<RootDirectory> for DirEntry {
    fn from(r: RootDirectory) -> Self {
        DirEntry::Root(r)
    }
}

/// Round a timestamp down to whole milliseconds, the metadata resolution.
pub fn round_ms(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}

/// Normalize a server timestamp that may be second- or millisecond-based.
///
/// Listings mix both resolutions across fields; anything below 10^12 is
/// taken as seconds (that threshold is past the year 33000 in seconds and
/// 2001 in milliseconds).
pub fn timestamp_to_datetime(value: i64) -> DateTime<Utc> {
    let ms = if value.abs() < 1_000_000_000_000 { value * 1000 } else { value };
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Resolve a MIME type: keep the caller's (sans `; charset=…` suffix), else
/// infer from the file extension, else `application/octet-stream`.
pub fn infer_mime(name: &str, mime: &str) -> String {
    if !mime.is_empty() {
        return mime.split(';').next().unwrap_or(mime).trim().to_string();
    }
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
