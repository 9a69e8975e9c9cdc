// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Keyed frame MAC.
//!
//! HMAC-SHA1 under the 256-byte session key. Each call computes the tag
//! from scratch; there is no accumulating state between frames. Tag
//! verification is constant-time.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::crypto::keystream::{BadKeyLength, KEY_LEN};

/// Tag length appended to every PRIVATE frame.
pub const TAG_LEN: usize = 20;

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub struct FrameMac {
    mac: HmacSha1,
}

impl FrameMac {
    pub fn new(key: &[u8]) -> Result<Self, BadKeyLength> {
        if key.len() != KEY_LEN {
            return Err(BadKeyLength(key.len()));
        }
        let mac = HmacSha1::new_from_slice(key).map_err(|_| BadKeyLength(key.len()))?;
        Ok(Self { mac })
    }

    /// Compute the tag over `msg`.
    pub fn tag(&self, msg: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = self.mac.clone();
        mac.update(msg);
        let digest = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest);
        tag
    }

    /// Constant-time verification of `tag` against `msg`.
    pub fn verify(&self, msg: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(msg);
        mac.verify_slice(tag).is_ok()
    }
}

impl core::fmt::Debug for FrameMac {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameMac").finish_non_exhaustive()
    }
}
