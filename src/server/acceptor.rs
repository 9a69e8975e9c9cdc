// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The listener.
//!
//! Accepts TCP connections and runs each as an independent tokio task.
//! Tasks share nothing but the store handle; cancelling the token stops
//! the accept loop and tells every live connection to wind down.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{cfg::config::Config, server::connection::serve_connection, store::Store};

pub struct Server {
    listener: TcpListener,
    store: Arc<Store>,
    cfg: Arc<Config>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn bind(
        cfg: Arc<Config>,
        store: Arc<Store>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let addr = cfg.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self {
            listener,
            store,
            cfg,
            cancel,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    pub async fn run(self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("acceptor shutting down");
                    return Ok(());
                },
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted.context("accept failed")?;
                    debug!(%addr, "incoming connection");
                    tokio::spawn(serve_connection(
                        stream,
                        Arc::clone(&self.store),
                        Arc::clone(&self.cfg),
                        self.cancel.clone(),
                    ));
                },
            }
        }
    }
}
