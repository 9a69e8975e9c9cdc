// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The symmetric construction protecting PRIVATE frames.
//!
//! A session derives one 256-byte key per login (see [`kdf`]); the same
//! key feeds both the keystream cipher and the keyed MAC. Each endpoint
//! keeps a single keystream that every sealed or opened frame consumes in
//! wire order, so the strictly alternating request/response exchange keeps
//! both sides in lockstep.

/// Key derivation (PBKDF2) for stored secrets and session keys.
pub mod kdf;
/// The RC4-DROP-2048 keystream generator.
pub mod keystream;
/// Keyed HMAC-SHA1 tags over sealed frame bodies.
pub mod mac;

use crate::crypto::{
    keystream::{BadKeyLength, Rc4},
    mac::FrameMac,
};

/// Keystream and MAC state installed on a session by a successful
/// (or deliberately fake) authentication.
#[derive(Debug, Clone)]
pub struct SessionCrypto {
    pub stream: Rc4,
    pub mac: FrameMac,
}

impl SessionCrypto {
    pub fn new(key: &[u8]) -> Result<Self, BadKeyLength> {
        Ok(Self {
            stream: Rc4::new(key)?,
            mac: FrameMac::new(key)?,
        })
    }
}
