// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use spmd_rs::{
    cfg::{
        cli::{parse_args, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    crypto::kdf,
    server::acceptor::Server,
    store::Store,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args(std::env::args().skip(1))?;
    let mut cfg = match &cli.config {
        Some(path) => resolve_config_path(path).and_then(Config::load_from_file)?,
        None => Config::default(),
    };
    cfg.server.bind = cli.bind;
    cfg.server.port = cli.port;

    let _log_guard = init_logger(cfg.logger_config.as_deref())?;

    let store = Store::open(&cfg.server.db_path, &cfg.server.root_dir)
        .context("failed to open the policy store")?;
    bootstrap(&store, &cfg)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    let server = Server::bind(Arc::new(cfg), Arc::new(store), cancel).await?;
    info!("listening on {}", server.local_addr()?);
    server.run().await
}

/// Seed the initial super subject on a fresh database so an operator can
/// log in at all.
fn bootstrap(store: &Store, cfg: &Config) -> Result<()> {
    if store.db.subject_names()?.is_empty() {
        let boot = &cfg.server.bootstrap;
        let secret = hex::encode(kdf::stored_secret(&boot.subject, &boot.password));
        store
            .db
            .insert_subject(&boot.subject, &secret, &boot.stype, boot.is_super)?;
        info!(subject = %boot.subject, "bootstrapped initial super subject");
    }
    Ok(())
}
