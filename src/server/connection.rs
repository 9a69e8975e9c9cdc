// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One accepted connection.
//!
//! The read loop reassembles exact 2048-byte frames and feeds them to the
//! session in arrival order. All writes go through [`FrameSink`], whose
//! mutex guarantees a frame is never interleaved with another frame's
//! bytes; `write_all` on the underlying half provides the backpressure.

use std::sync::Arc;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::Config,
    models::FRAME_LEN,
    session::handler::{Flow, Session},
    store::Store,
};

/// Serialized outbound frames for one connection.
#[derive(Debug)]
pub struct FrameSink {
    writer: Mutex<OwnedWriteHalf>,
}

impl FrameSink {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub async fn send(&self, frame: &[u8; FRAME_LEN]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await
    }
}

/// Run one connection to completion. Errors are reported to the peer and,
/// depending on the kind, either close the connection or leave the session
/// usable.
pub async fn serve_connection(
    stream: TcpStream,
    store: Arc<Store>,
    cfg: Arc<Config>,
    cancel: CancellationToken,
) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, "set_nodelay failed: {e}");
    }
    let (mut reader, writer) = stream.into_split();
    let sink = FrameSink::new(writer);
    let mut session = Session::new(store, cfg, peer.clone());
    let mut raw = [0u8; FRAME_LEN];
    info!(%peer, "connection accepted");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                session.send_die(&sink).await;
                break;
            },
            read = reader.read_exact(&mut raw) => {
                if let Err(e) = read {
                    debug!(%peer, "read ended: {e}");
                    break;
                }
            },
        }
        match session.handle_block(&raw, &sink).await {
            Ok(Flow::Continue) => {},
            Ok(Flow::Close) => {
                session.send_die(&sink).await;
                break;
            },
            Err(e) => {
                warn!(%peer, error = %e, "request failed");
                session.send_error(&sink, &e.wire_text()).await;
                if e.closes_connection() {
                    session.send_die(&sink).await;
                    break;
                }
            },
        }
    }
    info!(%peer, "connection closed");
}
