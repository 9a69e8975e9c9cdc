// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Protocol-level error kinds.
//!
//! Every failure the session layer can hit maps onto one of these
//! variants. Each variant knows two things the connection loop needs: the
//! exact text to put into an `ERROR_SERVER` frame, and whether the failure
//! tears the connection down or leaves the session usable.

use thiserror::Error;

use crate::{crypto::keystream::BadKeyLength, store::StoreError, tickets::BadTicketError};

#[derive(Debug, Error)]
pub enum SpmError {
    /// Malformed, unauthenticated or MAC-failing frame; disallowed
    /// (class, type) pair; unknown type byte.
    #[error("bad message: {0}")]
    BadMessage(String),

    #[error(transparent)]
    BadTicket(#[from] BadTicketError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u32, server: u32 },

    /// Message type is legal on the wire but illegal in the current
    /// session state.
    #[error("ambiguous message sequence")]
    AmbiguousSequence,

    /// Operation refused with a reply the client is expected to read;
    /// the session stays alive.
    #[error("{0}")]
    Refused(String),

    #[error("crypto failure: {0}")]
    Crypto(#[from] BadKeyLength),
}

impl SpmError {
    /// The text carried by the `ERROR_SERVER` reply for this failure.
    pub fn wire_text(&self) -> String {
        match self {
            SpmError::BadMessage(_) | SpmError::Crypto(_) => "BadMessageError".to_string(),
            SpmError::BadTicket(_) => "BadTicketError".to_string(),
            SpmError::Store(StoreError::Io(_)) | SpmError::Io(_) => "IOError".to_string(),
            SpmError::Store(e) => format!("DatabaseError: {e}"),
            SpmError::VersionMismatch { .. } => "Version mismatch.".to_string(),
            SpmError::AmbiguousSequence => "Ambiguous message sequence".to_string(),
            SpmError::Refused(msg) => msg.clone(),
        }
    }

    /// Whether the connection must be closed after reporting the error.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            SpmError::BadMessage(_)
                | SpmError::Crypto(_)
                | SpmError::VersionMismatch { .. }
                | SpmError::AmbiguousSequence
        )
    }
}
