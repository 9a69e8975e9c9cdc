// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RC4-DROP-2048 keystream.
//!
//! Standard RC4 key scheduling over a 256-byte state with the first 2048
//! output bytes discarded at construction. The generator is deterministic:
//! two instances built from the same key emit byte-identical streams, which
//! is what lets the two session endpoints decrypt each other as long as
//! they consume the stream in the same frame order.

use thiserror::Error;

/// Required key length in bytes.
pub const KEY_LEN: usize = 256;

/// Keystream bytes discarded after key scheduling.
const DROP_BYTES: usize = 2048;

/// Returned when a keystream or MAC is built from a key of the wrong size.
#[derive(Debug, Error)]
#[error("session key must be {KEY_LEN} bytes, got {0}")]
pub struct BadKeyLength(pub usize);

#[derive(Clone)]
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    pub fn new(key: &[u8]) -> Result<Self, BadKeyLength> {
        if key.len() != KEY_LEN {
            return Err(BadKeyLength(key.len()));
        }
        let mut s = [0u8; 256];
        for (idx, slot) in s.iter_mut().enumerate() {
            *slot = idx as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % KEY_LEN]);
            s.swap(i, usize::from(j));
        }
        let mut stream = Self { s, i: 0, j: 0 };
        stream.advance(DROP_BYTES);
        Ok(stream)
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[usize::from(self.i)]);
        self.s.swap(usize::from(self.i), usize::from(self.j));
        let idx = self.s[usize::from(self.i)].wrapping_add(self.s[usize::from(self.j)]);
        self.s[usize::from(idx)]
    }

    /// Discard `n` keystream bytes.
    pub fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.next_byte();
        }
    }

    /// XOR `data` with the next `data.len()` keystream bytes in place.
    pub fn xor_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

impl core::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // State bytes are key material; never print them.
        f.debug_struct("Rc4").finish_non_exhaustive()
    }
}
