//! # SkyVault SDK
//!
//! Client SDK for the SkyVault end-to-end-encrypted cloud drive.
//!
//! Files live on object storage as independently encrypted 1 MiB chunks;
//! file content, file names and directory names are all encrypted
//! client-side with keys derived from the account password. The server
//! only ever sees ciphertext and opaque UUIDs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use skyvault_client::{Cancel, Config};
//! use skyvault_sdk::{Drive, IncompleteFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = Cancel::new();
//!     let drive = Drive::login(&ctx, Config::default(), "me@example.com", "hunter2").await?;
//!
//!     // create a directory tree and upload into it
//!     let docs = drive.find_or_create_directory(&ctx, "/backups/docs").await?;
//!     let info = IncompleteFile::from_path(drive.auth_version(), "notes.txt", &docs).await?;
//!     let reader = tokio::fs::File::open("notes.txt").await?;
//!     let file = drive.upload_file(&ctx, &info, reader).await?;
//!
//!     // and fetch it back
//!     drive.download_to_path(&ctx, &file, "notes.copy.txt").await?;
//!     Ok(())
//! }
//! ```

pub mod dirs;
pub mod download;
pub mod error;
pub mod serialization;
pub mod session;
pub mod types;
pub mod upload;

pub use download::ChunkedReader;
pub use error::{Error, Result};
pub use session::{CryptoIdentity, Drive};
pub use types::{
    infer_mime, new_file_key, DirColor, DirEntry, Directory, File, FsObject, IncompleteFile,
    RootDirectory,
};
pub use upload::CHUNK_SIZE;

// the transport surface callers need to drive the SDK
pub use skyvault_client::{Cancel, Config};
