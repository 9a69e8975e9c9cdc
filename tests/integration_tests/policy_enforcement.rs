// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use spmd_rs::client::client::Client;

use crate::integration_tests::common::{ADMIN_PASSWORD, spawn_daemon};

#[tokio::test]
async fn test_ordinary_subjects_cannot_administrate() -> Result<()> {
    let daemon = spawn_daemon(true).await?;

    let mut admin = Client::connect(daemon.addr).await?;
    admin.greet().await?;
    admin.authenticate("admin", ADMIN_PASSWORD).await?;
    admin.make_subject("alice", "user", "secret1234").await?;

    let mut alice = Client::connect(daemon.addr).await?;
    alice.greet().await?;
    alice.authenticate("alice", "secret1234").await?;

    for err in [
        alice.make_subject("eve", "user", "longenough1").await,
        alice.make_link("alice", "admin").await,
        alice.make_filter("user", "user", "T/r").await,
        alice.delete_subject("admin").await,
        alice.clear_links("admin").await,
    ] {
        let err = err.expect_err("administrative call by ordinary subject");
        assert!(err.to_string().contains("Permission denied"));
    }
    assert!(daemon.store.db.get_subject("eve")?.is_none());
    assert!(daemon.store.db.get_subject("admin")?.is_some());

    alice.die().await?;
    admin.die().await?;
    Ok(())
}

#[tokio::test]
async fn test_held_tickets_unlock_transfer_and_read() -> Result<()> {
    let daemon = spawn_daemon(true).await?;
    let workdir = tempfile::tempdir()?;
    let local = workdir.path().join("file.bin");
    tokio::fs::write(&local, b"guarded payload").await?;

    let mut admin = Client::connect(daemon.addr).await?;
    admin.greet().await?;
    admin.authenticate("admin", ADMIN_PASSWORD).await?;
    admin.make_subject("a", "user", "password-a1").await?;
    admin.make_subject("b", "user", "password-b1").await?;
    admin.make_link("a", "b").await?;
    admin.make_filter("user", "user", "T/r").await?;
    admin.push_file(&local, "file").await?;
    admin.give_ticket("a", "T/r", "/file", true).await?;

    // The donor holds T/r, a link a->b exists, and a (user, user, T/r)
    // filter permits the move.
    let mut donor = Client::connect(daemon.addr).await?;
    donor.greet().await?;
    donor.authenticate("a", "password-a1").await?;
    donor.xfer_ticket("a", "b", "T/r", "/file", true).await?;
    assert!(daemon.store.db.get_right("b", "T/r", "/file", true)?.is_some());
    donor.die().await?;

    // The recipient can now read the object; pulling without the ticket
    // was never possible for the donor-less subject.
    let mut reader = Client::connect(daemon.addr).await?;
    reader.greet().await?;
    reader.authenticate("b", "password-b1").await?;
    let fetched = workdir.path().join("fetched.bin");
    reader.pull_file("/file", &fetched).await?;
    assert_eq!(tokio::fs::read(&fetched).await?, b"guarded payload");

    // A second transfer by the recipient fails: no link b->a.
    let err = reader
        .xfer_ticket("b", "a", "T/r", "/file", true)
        .await
        .expect_err("no reverse link");
    assert!(err.to_string().contains("Permission denied"));

    reader.die().await?;
    admin.die().await?;
    Ok(())
}

#[tokio::test]
async fn test_read_without_ticket_is_denied() -> Result<()> {
    let daemon = spawn_daemon(true).await?;
    let workdir = tempfile::tempdir()?;
    let local = workdir.path().join("file.bin");
    tokio::fs::write(&local, b"secret payload").await?;

    let mut admin = Client::connect(daemon.addr).await?;
    admin.greet().await?;
    admin.authenticate("admin", ADMIN_PASSWORD).await?;
    admin.make_subject("alice", "user", "secret1234").await?;
    admin.push_file(&local, "file").await?;

    let mut alice = Client::connect(daemon.addr).await?;
    alice.greet().await?;
    alice.authenticate("alice", "secret1234").await?;
    let fetched = workdir.path().join("fetched.bin");
    let err = alice
        .pull_file("/file", &fetched)
        .await
        .expect_err("no read ticket");
    assert!(err.to_string().contains("Permission denied"));
    assert!(!fetched.exists());

    alice.die().await?;
    admin.die().await?;
    Ok(())
}
