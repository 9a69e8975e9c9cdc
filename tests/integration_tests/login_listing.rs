// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use spmd_rs::client::client::Client;

use crate::integration_tests::common::{ADMIN_PASSWORD, spawn_daemon};

#[tokio::test]
async fn test_admin_login_and_listing() -> Result<()> {
    let daemon = spawn_daemon(true).await?;

    let mut client = Client::connect(daemon.addr).await?;
    client.greet().await?;
    client.authenticate("admin", ADMIN_PASSWORD).await?;

    let subjects = client.list_subjects().await?;
    assert_eq!(subjects, vec!["admin".to_string()]);

    // A fresh root has no objects.
    let objects = client.list_objects().await?;
    assert!(objects.is_empty());

    assert_eq!(client.pwd().await?, "/");
    client.die().await?;
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_cannot_open_confirmation() -> Result<()> {
    let daemon = spawn_daemon(true).await?;

    let mut client = Client::connect(daemon.addr).await?;
    client.greet().await?;
    assert!(client.authenticate("admin", "not-the-password").await.is_err());
    Ok(())
}
