// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Building and opening 2048-byte frames.
//!
//! Layout: `class:u8 | type:u8 | body[2026] | tag[20]`. A session without
//! installed crypto speaks (and accepts) only PUBLIC frames; once a key is
//! installed only PRIVATE frames pass in either direction. Sealing XORs
//! the type byte and body with the session keystream and appends the MAC
//! of the ciphertext region; opening verifies the tag before consuming a
//! single keystream byte, so a forged frame cannot desynchronise the
//! stream.

use crate::{
    crypto::SessionCrypto,
    errors::SpmError,
    models::{
        FRAME_LEN, TAG_OFFSET, class::MessageClass, kind::MessageKind, message::Message,
    },
};

/// Serialize `msg` into a wire frame. `crypto` decides the class: sealed
/// PRIVATE when present, cleartext PUBLIC (zeroed tag region) otherwise.
pub fn build(
    msg: &Message,
    crypto: Option<&mut SessionCrypto>,
) -> Result<[u8; FRAME_LEN], SpmError> {
    let kind = msg.kind();
    let mut frame = [0u8; FRAME_LEN];
    frame[1] = kind as u8;
    msg.encode_body(&mut frame[2..TAG_OFFSET])?;
    match crypto {
        Some(crypto) => {
            if !kind.allowed_in(MessageClass::Private) {
                return Err(SpmError::BadMessage(format!(
                    "{kind:?} cannot travel in a private frame"
                )));
            }
            frame[0] = MessageClass::Private as u8;
            crypto.stream.xor_in_place(&mut frame[1..TAG_OFFSET]);
            let tag = crypto.mac.tag(&frame[1..TAG_OFFSET]);
            frame[TAG_OFFSET..].copy_from_slice(&tag);
        },
        None => {
            if !kind.allowed_in(MessageClass::Public) {
                return Err(SpmError::BadMessage(format!(
                    "{kind:?} cannot travel in a public frame"
                )));
            }
            frame[0] = MessageClass::Public as u8;
        },
    }
    Ok(frame)
}

/// Parse one wire frame. The class byte must agree with the presence of
/// session crypto: encrypted frames are rejected before authentication and
/// cleartext frames after it.
pub fn parse(raw: &[u8], crypto: Option<&mut SessionCrypto>) -> Result<Message, SpmError> {
    if raw.len() != FRAME_LEN {
        return Err(SpmError::BadMessage(format!(
            "frame length {} != {FRAME_LEN}",
            raw.len()
        )));
    }
    let class = MessageClass::from_u8(raw[0])
        .ok_or_else(|| SpmError::BadMessage(format!("unknown class byte {:#04x}", raw[0])))?;
    match (class, crypto) {
        (MessageClass::Private, Some(crypto)) => {
            if !crypto.mac.verify(&raw[1..TAG_OFFSET], &raw[TAG_OFFSET..]) {
                return Err(SpmError::BadMessage("MAC failure".to_string()));
            }
            let mut clear = [0u8; TAG_OFFSET - 1];
            clear.copy_from_slice(&raw[1..TAG_OFFSET]);
            crypto.stream.xor_in_place(&mut clear);
            let kind = MessageKind::from_u8(clear[0]).ok_or_else(|| {
                SpmError::BadMessage(format!("unknown type byte {:#04x}", clear[0]))
            })?;
            if !kind.allowed_in(MessageClass::Private) {
                return Err(SpmError::BadMessage(format!(
                    "{kind:?} is not allowed in a private frame"
                )));
            }
            Message::decode_body(kind, &clear[1..])
        },
        (MessageClass::Public, None) => {
            let kind = MessageKind::from_u8(raw[1]).ok_or_else(|| {
                SpmError::BadMessage(format!("unknown type byte {:#04x}", raw[1]))
            })?;
            if !kind.allowed_in(MessageClass::Public) {
                return Err(SpmError::BadMessage(format!(
                    "{kind:?} is not allowed in a public frame"
                )));
            }
            Message::decode_body(kind, &raw[2..TAG_OFFSET])
        },
        (MessageClass::Private, None) => Err(SpmError::BadMessage(
            "encrypted frame before authentication".to_string(),
        )),
        (MessageClass::Public, Some(_)) => Err(SpmError::BadMessage(
            "cleartext frame on an authenticated session".to_string(),
        )),
    }
}
