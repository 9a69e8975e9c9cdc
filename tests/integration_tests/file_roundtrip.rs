// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use md5::{Digest, Md5};
use rand::RngExt;
use spmd_rs::client::client::Client;

use crate::integration_tests::common::{ADMIN_PASSWORD, spawn_daemon};

fn md5_of(bytes: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[tokio::test]
async fn test_push_then_pull_returns_identical_bytes() -> Result<()> {
    let daemon = spawn_daemon(true).await?;
    let workdir = tempfile::tempdir()?;

    let mut payload = vec![0u8; 102_400];
    rand::rng().fill(&mut payload[..]);
    let local = workdir.path().join("upload.bin");
    tokio::fs::write(&local, &payload).await?;

    let mut client = Client::connect(daemon.addr).await?;
    client.greet().await?;
    client.authenticate("admin", ADMIN_PASSWORD).await?;

    client.push_file(&local, "data.bin").await?;
    assert!(client
        .list_objects()
        .await?
        .contains(&"/data.bin".to_string()));

    let fetched = workdir.path().join("download.bin");
    client.pull_file("data.bin", &fetched).await?;

    let downloaded = tokio::fs::read(&fetched).await?;
    assert_eq!(downloaded.len(), payload.len());
    assert_eq!(md5_of(&downloaded), md5_of(&payload));

    // Pulling over an existing local file is refused before any frame is
    // sent.
    assert!(client.pull_file("data.bin", &fetched).await.is_err());

    // Re-pushing an existing object is refused by the daemon.
    assert!(client.push_file(&local, "data.bin").await.is_err());

    client.die().await?;
    Ok(())
}

#[tokio::test]
async fn test_transfer_into_subdirectory() -> Result<()> {
    let daemon = spawn_daemon(true).await?;
    let workdir = tempfile::tempdir()?;

    let local = workdir.path().join("small.bin");
    tokio::fs::write(&local, b"just a few bytes").await?;

    let mut client = Client::connect(daemon.addr).await?;
    client.greet().await?;
    client.authenticate("admin", ADMIN_PASSWORD).await?;

    client.make_directory("docs").await?;
    client.cd("docs").await?;
    assert_eq!(client.pwd().await?, "/docs");

    client.push_file(&local, "small.bin").await?;
    assert_eq!(client.list_objects().await?, vec!["/docs/small.bin"]);

    let fetched = workdir.path().join("fetched.bin");
    client.pull_file("/docs/small.bin", &fetched).await?;
    assert_eq!(tokio::fs::read(&fetched).await?, b"just a few bytes");

    client.delete_path("small.bin").await?;
    assert!(client.list_objects().await?.is_empty());

    client.die().await?;
    Ok(())
}
