//! Basic SDK usage: log in, build a directory tree, upload, download.
//!
//! Requires SKYVAULT_EMAIL and SKYVAULT_PASSWORD to point at a live
//! account. Run with: cargo run --example basic_usage

use skyvault_sdk::{Cancel, Config, Drive, IncompleteFile};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let email = std::env::var("SKYVAULT_EMAIL")?;
    let password = std::env::var("SKYVAULT_PASSWORD")?;

    let ctx = Cancel::new();
    let drive = Drive::login(&ctx, Config::default(), &email, &password).await?;
    println!("logged in as {} (auth v{})", drive.email(), drive.auth_version());

    let (files, dirs) = drive.read_directory(&ctx, &drive.root().into()).await?;
    println!("root: {} files, {} directories", files.len(), dirs.len());

    let demo = drive.find_or_create_directory(&ctx, "/sdk-demo").await?;
    let info = IncompleteFile::new(
        drive.auth_version(),
        "greeting.txt",
        "",
        chrono::Utc::now(),
        chrono::Utc::now(),
        &demo,
    );
    let file = drive
        .upload_file(&ctx, &info, std::io::Cursor::new(b"hello from the sdk".to_vec()))
        .await?;
    println!("uploaded {} ({} bytes, {} chunks)", file.info.name, file.size, file.chunks);

    let mut reader = drive.download_reader(&ctx, &file);
    let content = reader.read_to_end().await?;
    reader.close().await?;
    println!("downloaded {} bytes: {:?}", content.len(), String::from_utf8_lossy(&content));

    Ok(())
}
