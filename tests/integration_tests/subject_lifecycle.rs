// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use spmd_rs::client::client::Client;

use crate::integration_tests::common::{ADMIN_PASSWORD, spawn_daemon};

#[tokio::test]
async fn test_create_login_delete_login() -> Result<()> {
    let daemon = spawn_daemon(true).await?;

    let mut admin = Client::connect(daemon.addr).await?;
    admin.greet().await?;
    admin.authenticate("admin", ADMIN_PASSWORD).await?;
    admin.make_subject("alice", "user", "secret1234").await?;

    // The new subject can log in on its own connection.
    let mut alice = Client::connect(daemon.addr).await?;
    alice.greet().await?;
    alice.authenticate("alice", "secret1234").await?;
    let names = alice.list_subjects().await?;
    assert_eq!(names, vec!["admin".to_string(), "alice".to_string()]);
    alice.die().await?;

    admin.delete_subject("alice").await?;
    assert!(daemon.store.db.get_subject("alice")?.is_none());

    // After deletion the confirmation comes back under a random key the
    // client cannot open.
    let mut ghost = Client::connect(daemon.addr).await?;
    ghost.greet().await?;
    assert!(ghost.authenticate("alice", "secret1234").await.is_err());

    admin.die().await?;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_and_short_password_are_refused() -> Result<()> {
    let daemon = spawn_daemon(true).await?;

    let mut admin = Client::connect(daemon.addr).await?;
    admin.greet().await?;
    admin.authenticate("admin", ADMIN_PASSWORD).await?;

    admin.make_subject("bob", "user", "longenough1").await?;
    let err = admin
        .make_subject("bob", "user", "longenough1")
        .await
        .expect_err("duplicate subject");
    assert!(err.to_string().contains("Subject already exists"));

    let err = admin
        .make_subject("carl", "user", "short")
        .await
        .expect_err("short password");
    assert!(err.to_string().contains("Password is way too short"));

    admin.die().await?;
    Ok(())
}
