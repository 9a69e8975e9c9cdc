// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod body;
pub mod class;
pub mod frame;
pub mod kind;
pub mod message;

use crate::crypto::mac::TAG_LEN;

/// Fixed size of every wire frame.
pub const FRAME_LEN: usize = 2048;

/// Bytes between the two header bytes and the trailing MAC tag.
pub const BODY_LEN: usize = FRAME_LEN - 2 - TAG_LEN;

/// Offset of the MAC tag inside a frame.
pub const TAG_OFFSET: usize = FRAME_LEN - TAG_LEN;

/// Fixed field widths shared by both endpoints.
pub const SUBJECT_LEN: usize = 64;
pub const PASSWORD_LEN: usize = 64;
pub const TYPE_LEN: usize = 64;
pub const TARGET_LEN: usize = 64;
pub const SALT_LEN: usize = 32;
pub const PATH_LEN: usize = 256;

/// Payload bytes carried by one `XFER_FILE` frame.
pub const DATA_LEN: usize = FRAME_LEN - 2 - 2 - TAG_LEN;

/// Entries per `LIST_SUBJECT_SERVER` frame.
pub const SUBJECTS_PER_FRAME: usize = 31;

/// Entries per `LIST_OBJECT_SERVER` frame.
pub const OBJECTS_PER_FRAME: usize = 7;

/// Version carried by the greeting exchange.
pub const PROTOCOL_VERSION: u32 = 1;
