// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire-safe, zero-copy body layouts.
//!
//! Every message body is a packed struct of fixed-width fields laid down
//! at offset 2 of the frame. String fields are UTF-8, zero-padded to their
//! declared width; the remainder of the 2026-byte body region is zero.

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16, U32};

use crate::{
    errors::SpmError,
    models::{
        BODY_LEN, DATA_LEN, OBJECTS_PER_FRAME, PASSWORD_LEN, PATH_LEN, SALT_LEN,
        SUBJECT_LEN, SUBJECTS_PER_FRAME, TARGET_LEN, TYPE_LEN,
    },
    tickets::Ticket,
};

/// Copy `value` into a zero-padded fixed-width field.
pub fn write_str(field: &mut [u8], value: &str) -> Result<(), SpmError> {
    let bytes = value.as_bytes();
    if bytes.len() > field.len() {
        return Err(SpmError::BadMessage(format!(
            "string field overflow: {} > {}",
            bytes.len(),
            field.len()
        )));
    }
    field[..bytes.len()].copy_from_slice(bytes);
    field[bytes.len()..].fill(0);
    Ok(())
}

/// Read a zero-padded fixed-width field back into an owned string.
pub fn read_str(field: &[u8]) -> Result<String, SpmError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| SpmError::BadMessage("invalid utf-8 in string field".to_string()))
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct HelloBody {
    pub version: U32<BigEndian>,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PathBody {
    pub path: [u8; PATH_LEN],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SubjectBody {
    pub subject: [u8; SUBJECT_LEN],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ErrorBody {
    pub msg: [u8; BODY_LEN],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct AuthSubjectBody {
    pub subject: [u8; SUBJECT_LEN],
    pub salt: [u8; SALT_LEN],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct XferFileBody {
    pub data: [u8; DATA_LEN],
    pub size: U16<BigEndian>,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SubjectListBody {
    pub subjects: [[u8; SUBJECT_LEN]; SUBJECTS_PER_FRAME],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ObjectListBody {
    pub paths: [[u8; PATH_LEN]; OBJECTS_PER_FRAME],
}

/// Shared by `GIVE_TICKET_SUBJECT` and `TAKE_TICKET_SUBJECT`.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TicketOpBody {
    pub subject: [u8; SUBJECT_LEN],
    pub ticket: [u8; Ticket::WIRE_LEN],
    pub target: [u8; TARGET_LEN],
    pub is_object: u8,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TicketXferBody {
    pub from: [u8; SUBJECT_LEN],
    pub to: [u8; SUBJECT_LEN],
    pub ticket: [u8; Ticket::WIRE_LEN],
    pub target: [u8; TARGET_LEN],
    pub is_object: u8,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct MakeSubjectBody {
    pub subject: [u8; SUBJECT_LEN],
    pub stype: [u8; TYPE_LEN],
    pub password: [u8; PASSWORD_LEN],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FilterBody {
    pub type1: [u8; TYPE_LEN],
    pub type2: [u8; TYPE_LEN],
    pub ticket: [u8; Ticket::WIRE_LEN],
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LinkBody {
    pub subject1: [u8; SUBJECT_LEN],
    pub subject2: [u8; SUBJECT_LEN],
}
