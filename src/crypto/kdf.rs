// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Key derivation.
//!
//! The daemon never stores passwords. At subject creation both sides can
//! compute `stored_secret`, a PBKDF2 digest salted with the subject name
//! (deterministic, so the client can re-derive it from the password alone).
//! At login the per-session key is stretched from that stored secret and
//! the fresh salt carried by `AUTH_SUBJECT`.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

use crate::crypto::keystream::KEY_LEN;

/// Stored-secret digest length.
pub const SECRET_LEN: usize = 32;

/// Rounds for the at-rest secret. Only paid once per subject creation and
/// once per client login.
pub const SECRET_ROUNDS: u32 = 4096;

/// Rounds for the per-session key derivation.
pub const SESSION_ROUNDS: u32 = 16;

/// Digest of a subject's password, salted with the subject name. This is
/// what the `subjects` table stores (hex-encoded).
pub fn stored_secret(subject: &str, password: &str) -> [u8; SECRET_LEN] {
    let mut out = [0u8; SECRET_LEN];
    pbkdf2_hmac::<Sha1>(
        password.as_bytes(),
        subject.as_bytes(),
        SECRET_ROUNDS,
        &mut out,
    );
    out
}

/// Per-session 256-byte key from the stored secret and the login salt.
pub fn session_key(secret: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha1>(secret, salt, SESSION_ROUNDS, &mut out);
    out
}
