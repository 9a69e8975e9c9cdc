// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The message type byte and the (class, type) admission table.

use crate::models::class::MessageClass;

/// Every message type the protocol knows. The numeric values are the wire
/// encoding of the second frame byte and must match on both endpoints.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    HelloServer = 0x00,
    HelloClient = 0x01,
    Die = 0x02,
    PullFile = 0x03,
    PushFile = 0x04,
    XferFile = 0x05,
    Okay = 0x06,
    ErrorServer = 0x07,
    AuthSubject = 0x08,
    ConfirmAuth = 0x09,
    RejectAuth = 0x0a,
    ListSubjectClient = 0x0b,
    ListSubjectServer = 0x0c,
    ListObjectClient = 0x0d,
    ListObjectServer = 0x0e,
    GiveTicketSubject = 0x0f,
    TakeTicketSubject = 0x10,
    XferTicket = 0x11,
    MakeDirectory = 0x12,
    MakeSubject = 0x13,
    Cd = 0x14,
    GetCd = 0x15,
    MakeFilter = 0x16,
    DeleteFilter = 0x17,
    MakeLink = 0x18,
    DeletePath = 0x19,
    ClearLinks = 0x1a,
    DeleteSubject = 0x1b,
}

impl MessageKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::HelloServer,
            0x01 => Self::HelloClient,
            0x02 => Self::Die,
            0x03 => Self::PullFile,
            0x04 => Self::PushFile,
            0x05 => Self::XferFile,
            0x06 => Self::Okay,
            0x07 => Self::ErrorServer,
            0x08 => Self::AuthSubject,
            0x09 => Self::ConfirmAuth,
            0x0a => Self::RejectAuth,
            0x0b => Self::ListSubjectClient,
            0x0c => Self::ListSubjectServer,
            0x0d => Self::ListObjectClient,
            0x0e => Self::ListObjectServer,
            0x0f => Self::GiveTicketSubject,
            0x10 => Self::TakeTicketSubject,
            0x11 => Self::XferTicket,
            0x12 => Self::MakeDirectory,
            0x13 => Self::MakeSubject,
            0x14 => Self::Cd,
            0x15 => Self::GetCd,
            0x16 => Self::MakeFilter,
            0x17 => Self::DeleteFilter,
            0x18 => Self::MakeLink,
            0x19 => Self::DeletePath,
            0x1a => Self::ClearLinks,
            0x1b => Self::DeleteSubject,
            _ => return None,
        })
    }

    /// Whether this type may travel under the given frame class.
    pub fn allowed_in(self, class: MessageClass) -> bool {
        match class {
            MessageClass::Public => matches!(
                self,
                Self::HelloServer
                    | Self::HelloClient
                    | Self::Die
                    | Self::ErrorServer
                    | Self::AuthSubject
                    | Self::RejectAuth
            ),
            MessageClass::Private => !matches!(
                self,
                Self::HelloServer | Self::HelloClient | Self::RejectAuth
            ),
        }
    }
}
