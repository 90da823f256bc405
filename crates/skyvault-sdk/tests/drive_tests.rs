//! End-to-end SDK scenarios over the in-memory transport
//!
//! Run with: cargo test --package skyvault-sdk --test drive_tests

mod common;

use common::MockTransport;
use skyvault_client::cancel::CancelCause;
use skyvault_client::{Cancel, Transport};
use skyvault_sdk::{Drive, DirEntry, Error, FsObject, IncompleteFile, CHUNK_SIZE};
use std::sync::Arc;
use std::time::Duration;

const EMAIL: &str = "tester@example.com";
const PASSWORD: &str = "correct horse battery staple";

async fn v2_drive() -> (Arc<MockTransport>, Drive) {
    let mock = Arc::new(MockTransport::v2_account(EMAIL, PASSWORD));
    let transport: Arc<dyn Transport> = mock.clone();
    let drive = Drive::login_with_transport(&Cancel::new(), transport, EMAIL, PASSWORD)
        .await
        .expect("v2 login");
    (mock, drive)
}

async fn v3_drive() -> (Arc<MockTransport>, Drive) {
    let mock = Arc::new(MockTransport::v3_account(EMAIL, PASSWORD));
    let transport: Arc<dyn Transport> = mock.clone();
    let drive = Drive::login_with_transport(&Cancel::new(), transport, EMAIL, PASSWORD)
        .await
        .expect("v3 login");
    (mock, drive)
}

/// Deterministic multi-chunk content.
fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn upload_bytes(drive: &Drive, ctx: &Cancel, name: &str, data: &[u8]) -> skyvault_sdk::File {
    let now = chrono::Utc::now();
    let info = IncompleteFile::new(
        drive.auth_version(),
        name,
        "",
        now,
        now,
        &drive.root().into(),
    );
    drive
        .upload_file(ctx, &info, std::io::Cursor::new(data.to_vec()))
        .await
        .expect("upload")
}

#[tokio::test]
async fn test_login_v2_bootstrap() {
    let (mock, drive) = v2_drive().await;
    assert_eq!(drive.auth_version(), 2);
    assert_eq!(drive.email(), EMAIL);
    assert_eq!(drive.api_key().as_deref(), Some(mock.account.api_key.as_str()));
    assert_eq!(drive.root().uuid, mock.account.root_uuid);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let mock = Arc::new(MockTransport::v2_account(EMAIL, PASSWORD));
    let transport: Arc<dyn Transport> = mock.clone();
    let err = Drive::login_with_transport(&Cancel::new(), transport, EMAIL, "wrong")
        .await
        .unwrap_err();
    match err {
        Error::Api(api) => assert_eq!(api.code, "invalid_credentials"),
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_directory_tree_create_find_trash() {
    let (mock, drive) = v2_drive().await;
    let ctx = Cancel::new();

    // root starts empty
    let (files, dirs) = drive.read_directory(&ctx, &drive.root().into()).await.unwrap();
    assert!(files.is_empty() && dirs.is_empty());

    let created = drive.find_or_create_directory(&ctx, "/a/b/c").await.unwrap();
    assert_eq!(mock.dir_create_calls(), 3);

    let found = drive.find_directory(&ctx, "/a/b/c").await.unwrap().expect("find /a/b/c");
    assert_eq!(found.uuid(), created.uuid());

    // idempotent: same records, no further creations
    let again = drive.find_or_create_directory(&ctx, "/a/b/c").await.unwrap();
    assert_eq!(again, created);
    assert_eq!(mock.dir_create_calls(), 3);

    // empty path resolves to the root marker
    let root = drive.find_directory(&ctx, "").await.unwrap().unwrap();
    assert!(root.is_root());
    assert_eq!(root.uuid(), drive.root().uuid);

    // trash /a and the whole subtree becomes unreachable
    let a = drive.find_directory(&ctx, "/a").await.unwrap().unwrap();
    match &a {
        DirEntry::Directory(dir) => drive.trash_directory(&ctx, dir).await.unwrap(),
        DirEntry::Root(_) => panic!("/a must not be the root"),
    }
    assert!(drive.find_directory(&ctx, "/a").await.unwrap().is_none());
    assert!(drive.find_item(&ctx, "/a/b/c").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_small_file_then_download() {
    let (_mock, drive) = v2_drive().await;
    let ctx = Cancel::new();
    let content = b"Hello World From Rust!";

    let file = upload_bytes(&drive, &ctx, "hello.txt", content).await;
    assert_eq!(file.size, content.len() as u64);
    assert_eq!(file.chunks, 1);
    assert_eq!(file.info.mime, "text/plain");
    assert_eq!(file.region, "mock-region");
    assert_eq!(file.bucket, "mock-bucket");

    // the listing round-trips the metadata envelope
    let (files, _) = drive.read_directory(&ctx, &drive.root().into()).await.unwrap();
    assert_eq!(files.len(), 1);
    let listed = &files[0];
    assert_eq!(listed.info.name, "hello.txt");
    assert_eq!(listed.info.uuid, file.info.uuid);
    assert_eq!(listed.size, file.size);
    assert_eq!(listed.info.key, file.info.key);
    assert_eq!(listed.hash, file.hash);

    let mut reader = drive.download_reader(&ctx, listed);
    let downloaded = reader.read_to_end().await.unwrap();
    reader.close().await.unwrap();
    assert_eq!(downloaded, content);
}

#[tokio::test]
async fn test_multi_chunk_roundtrip_and_ranged_read() {
    let (_mock, drive) = v2_drive().await;
    let ctx = Cancel::new();
    let data = patterned(20 * CHUNK_SIZE);

    let file = upload_bytes(&drive, &ctx, "large_sample-20mb.bin", &data).await;
    assert_eq!(file.size, data.len() as u64);
    assert_eq!(file.chunks, 21);

    let mut reader = drive.download_reader(&ctx, &file);
    let downloaded = reader.read_to_end().await.unwrap();
    reader.close().await.unwrap();
    assert_eq!(downloaded, data);

    // 7 bytes starting exactly at the second chunk
    let mut ranged = drive.download_reader_ranged(&ctx, &file, CHUNK_SIZE as u64, 7);
    let window = ranged.read_to_end().await.unwrap();
    ranged.close().await.unwrap();
    assert_eq!(window, &data[CHUNK_SIZE..CHUNK_SIZE + 7]);
}

#[tokio::test]
async fn test_ranged_read_tail_after_chunk_boundary() {
    let (_mock, drive) = v2_drive().await;
    let ctx = Cancel::new();
    let data = patterned(CHUNK_SIZE + 5);

    let file = upload_bytes(&drive, &ctx, "boundary.bin", &data).await;

    let mut ranged = drive.download_reader_ranged(&ctx, &file, CHUNK_SIZE as u64, 5);
    let tail = ranged.read_to_end().await.unwrap();
    ranged.close().await.unwrap();
    assert_eq!(tail, &data[CHUNK_SIZE..]);
}

#[tokio::test]
async fn test_chunk_count_rule() {
    let (_mock, drive) = v2_drive().await;
    let ctx = Cancel::new();

    for (idx, size) in [1usize, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE]
        .into_iter()
        .enumerate()
    {
        let data = patterned(size);
        let file = upload_bytes(&drive, &ctx, &format!("sized-{idx}.bin"), &data).await;
        assert_eq!(file.chunks, (size / CHUNK_SIZE) as u64 + 1, "size {size}");

        let mut reader = drive.download_reader(&ctx, &file);
        let downloaded = reader.read_to_end().await.unwrap();
        reader.close().await.unwrap();
        assert_eq!(downloaded, data, "size {size}");
    }
}

#[tokio::test]
async fn test_empty_file_short_path() {
    let (mock, drive) = v2_drive().await;
    let ctx = Cancel::new();

    let file = upload_bytes(&drive, &ctx, "empty.txt", b"").await;
    assert_eq!(file.size, 0);
    assert_eq!(file.chunks, 0);
    assert_eq!(file.region, "");
    assert_eq!(file.bucket, "");
    // no chunk was ever posted
    assert_eq!(mock.chunk_uploads(), 0);

    match drive.find_item(&ctx, "/empty.txt").await.unwrap() {
        Some(FsObject::File(found)) => {
            assert_eq!(found.size, 0);
            assert_eq!(found.chunks, 0);
        }
        other => panic!("expected file, got {other:?}"),
    }

    let mut reader = drive.download_reader(&ctx, &file);
    let downloaded = reader.read_to_end().await.unwrap();
    reader.close().await.unwrap();
    assert!(downloaded.is_empty());

    // and through the filesystem path
    let target = std::env::temp_dir().join(format!("skyvault-empty-{}.txt", std::process::id()));
    drive.download_to_path(&ctx, &file, &target).await.unwrap();
    let on_disk = tokio::fs::read(&target).await.unwrap();
    let _ = tokio::fs::remove_file(&target).await;
    assert!(on_disk.is_empty());
}

#[tokio::test]
async fn test_session_serialization_roundtrip() {
    let (mock, drive) = v2_drive().await;
    let ctx = Cancel::new();
    drive.find_or_create_directory(&ctx, "/persisted").await.unwrap();
    let before = drive.read_directory(&ctx, &drive.root().into()).await.unwrap();

    let blob = drive.serialize().unwrap();
    // byte-deterministic on a stable session
    assert_eq!(blob, drive.serialize().unwrap());

    let transport: Arc<dyn Transport> = mock.clone();
    let restored = Drive::deserialize_with_transport(transport, &blob).unwrap();
    assert_eq!(restored.api_key(), drive.api_key());
    assert_eq!(restored.email(), drive.email());
    assert_eq!(restored.auth_version(), drive.auth_version());
    assert_eq!(restored.root(), drive.root());

    // the restored identity speaks the same envelopes
    let env = drive.encrypt_meta("shared secret").unwrap();
    assert_eq!(restored.decrypt_meta(&env).unwrap(), "shared secret");
    let env = restored.encrypt_meta("round trip").unwrap();
    assert_eq!(drive.decrypt_meta(&env).unwrap(), "round trip");
    assert_eq!(restored.hash_name("Some Name"), drive.hash_name("Some Name"));

    let after = restored.read_directory(&ctx, &restored.root().into()).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_v3_session_serialization_roundtrip() {
    let (mock, drive) = v3_drive().await;
    let blob = drive.serialize().unwrap();
    let transport: Arc<dyn Transport> = mock.clone();
    let restored = Drive::deserialize_with_transport(transport, &blob).unwrap();

    let env = drive.encrypt_meta("v3 payload").unwrap();
    assert!(env.as_str().starts_with("003"));
    assert_eq!(restored.decrypt_meta(&env).unwrap(), "v3 payload");
    assert_eq!(restored.hash_name("ABC"), drive.hash_name("abc"));
}

#[tokio::test]
async fn test_v3_upload_download_and_update_meta() {
    let (_mock, drive) = v3_drive().await;
    let ctx = Cancel::new();
    let data = patterned(CHUNK_SIZE + 17);

    let file = upload_bytes(&drive, &ctx, "report.pdf", &data).await;
    assert_eq!(file.info.mime, "application/pdf");
    assert_eq!(file.chunks, 2);

    let (files, _) = drive.read_directory(&ctx, &drive.root().into()).await.unwrap();
    assert_eq!(files.len(), 1);
    let mut listed = files.into_iter().next().unwrap();
    // v3 file keys are stored hex-encoded and must round-trip exactly
    assert_eq!(listed.info.key, file.info.key);

    let mut reader = drive.download_reader(&ctx, &listed);
    let downloaded = reader.read_to_end().await.unwrap();
    reader.close().await.unwrap();
    assert_eq!(downloaded, data);

    // rename through update_meta
    listed.info.name = "report-final.pdf".to_string();
    drive.update_meta(&ctx, &listed).await.unwrap();
    let (files, _) = drive.read_directory(&ctx, &drive.root().into()).await.unwrap();
    assert_eq!(files[0].info.name, "report-final.pdf");
    assert_eq!(files[0].size, data.len() as u64);
}

#[tokio::test]
async fn test_cancel_mid_upload_reports_cause_and_commits_nothing() {
    let mock = Arc::new(
        MockTransport::v2_account(EMAIL, PASSWORD).with_chunk_delay(Duration::from_millis(25)),
    );
    let transport: Arc<dyn Transport> = mock.clone();
    let drive = Drive::login_with_transport(&Cancel::new(), transport, EMAIL, PASSWORD)
        .await
        .unwrap();

    let ctx = Cancel::new();
    let data = patterned(20 * CHUNK_SIZE);
    let now = chrono::Utc::now();
    let info = IncompleteFile::new(drive.auth_version(), "doomed.bin", "", now, now, &drive.root().into());

    let upload_drive = drive.clone();
    let upload_ctx = ctx.clone();
    let upload = tokio::spawn(async move {
        upload_drive
            .upload_file(&upload_ctx, &info, std::io::Cursor::new(data))
            .await
    });

    // let at least one chunk land, then pull the plug with a specific cause
    mock.first_chunk.notified().await;
    ctx.cancel_with(Arc::new(std::io::Error::other("user aborted the transfer")) as CancelCause);

    let result = upload.await.unwrap();
    match result {
        Err(Error::Cancelled { cause }) => {
            assert_eq!(cause.to_string(), "user aborted the transfer")
        }
        Err(Error::Aborted) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }

    // nothing was finalized: the parent listing stays empty
    assert!(!mock.has_file_under(&mock.account.root_uuid));
    let (files, _) = drive
        .read_directory(&Cancel::new(), &drive.root().into())
        .await
        .unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_permanent_delete_file() {
    let (_mock, drive) = v2_drive().await;
    let ctx = Cancel::new();

    let file = upload_bytes(&drive, &ctx, "gone.txt", b"bye").await;
    drive.permanent_delete_file(&ctx, &file.info.uuid).await.unwrap();
    assert!(drive.find_item(&ctx, "/gone.txt").await.unwrap().is_none());

    // its chunks are gone with it
    let mut reader = drive.download_reader(&ctx, &file);
    assert!(reader.read_to_end().await.is_err());
}
