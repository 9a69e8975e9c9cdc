// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed messages.
//!
//! One variant per wire type, with typed fields. Ticket fields stay in
//! their raw three-character string form here; the session layer parses
//! them so that a malformed ticket is a recoverable `BadTicketError`
//! rather than a connection-killing frame error.

use bytes::Bytes;
use zerocopy::{FromZeros, U16, U32};

use crate::{
    errors::SpmError,
    models::{
        DATA_LEN, OBJECTS_PER_FRAME, SALT_LEN, SUBJECTS_PER_FRAME,
        body::{
            AuthSubjectBody, ErrorBody, FilterBody, HelloBody, LinkBody,
            MakeSubjectBody, ObjectListBody, PathBody, SubjectBody, SubjectListBody,
            TicketOpBody, TicketXferBody, XferFileBody, read_str, write_str,
        },
        kind::MessageKind,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HelloServer {
        version: u32,
    },
    HelloClient {
        version: u32,
    },
    Die,
    PullFile {
        name: String,
    },
    PushFile {
        name: String,
    },
    XferFile {
        data: Bytes,
    },
    Okay,
    ErrorServer {
        msg: String,
    },
    AuthSubject {
        subject: String,
        salt: [u8; SALT_LEN],
    },
    ConfirmAuth {
        subject: String,
    },
    RejectAuth,
    ListSubjectClient,
    ListSubjectServer {
        subjects: Vec<String>,
    },
    ListObjectClient,
    ListObjectServer {
        paths: Vec<String>,
    },
    GiveTicketSubject {
        subject: String,
        ticket: String,
        target: String,
        is_object: bool,
    },
    TakeTicketSubject {
        subject: String,
        ticket: String,
        target: String,
        is_object: bool,
    },
    XferTicket {
        from: String,
        to: String,
        ticket: String,
        target: String,
        is_object: bool,
    },
    MakeDirectory {
        dir: String,
    },
    MakeSubject {
        subject: String,
        stype: String,
        password: String,
    },
    Cd {
        path: String,
    },
    GetCd,
    MakeFilter {
        type1: String,
        type2: String,
        ticket: String,
    },
    DeleteFilter {
        type1: String,
        type2: String,
        ticket: String,
    },
    MakeLink {
        subject1: String,
        subject2: String,
    },
    DeletePath {
        path: String,
    },
    ClearLinks {
        subject: String,
    },
    DeleteSubject {
        subject: String,
    },
}

/// Serialize a packed body struct at the start of the body region.
fn emit<B: zerocopy::IntoBytes + zerocopy::Immutable>(body: &mut [u8], packed: &B) {
    let bytes = packed.as_bytes();
    body[..bytes.len()].copy_from_slice(bytes);
}

/// Borrow a packed body struct from the start of the body region.
fn view<B>(body: &[u8]) -> Result<&B, SpmError>
where B: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable {
    B::ref_from_prefix(body)
        .map(|(packed, _)| packed)
        .map_err(|_| SpmError::BadMessage("truncated body".to_string()))
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::HelloServer { .. } => MessageKind::HelloServer,
            Message::HelloClient { .. } => MessageKind::HelloClient,
            Message::Die => MessageKind::Die,
            Message::PullFile { .. } => MessageKind::PullFile,
            Message::PushFile { .. } => MessageKind::PushFile,
            Message::XferFile { .. } => MessageKind::XferFile,
            Message::Okay => MessageKind::Okay,
            Message::ErrorServer { .. } => MessageKind::ErrorServer,
            Message::AuthSubject { .. } => MessageKind::AuthSubject,
            Message::ConfirmAuth { .. } => MessageKind::ConfirmAuth,
            Message::RejectAuth => MessageKind::RejectAuth,
            Message::ListSubjectClient => MessageKind::ListSubjectClient,
            Message::ListSubjectServer { .. } => MessageKind::ListSubjectServer,
            Message::ListObjectClient => MessageKind::ListObjectClient,
            Message::ListObjectServer { .. } => MessageKind::ListObjectServer,
            Message::GiveTicketSubject { .. } => MessageKind::GiveTicketSubject,
            Message::TakeTicketSubject { .. } => MessageKind::TakeTicketSubject,
            Message::XferTicket { .. } => MessageKind::XferTicket,
            Message::MakeDirectory { .. } => MessageKind::MakeDirectory,
            Message::MakeSubject { .. } => MessageKind::MakeSubject,
            Message::Cd { .. } => MessageKind::Cd,
            Message::GetCd => MessageKind::GetCd,
            Message::MakeFilter { .. } => MessageKind::MakeFilter,
            Message::DeleteFilter { .. } => MessageKind::DeleteFilter,
            Message::MakeLink { .. } => MessageKind::MakeLink,
            Message::DeletePath { .. } => MessageKind::DeletePath,
            Message::ClearLinks { .. } => MessageKind::ClearLinks,
            Message::DeleteSubject { .. } => MessageKind::DeleteSubject,
        }
    }

    /// Pack the typed fields into the (pre-zeroed) body region.
    pub fn encode_body(&self, body: &mut [u8]) -> Result<(), SpmError> {
        match self {
            Message::HelloServer { version } | Message::HelloClient { version } => {
                emit(body, &HelloBody {
                    version: U32::new(*version),
                });
            },
            Message::Die
            | Message::Okay
            | Message::RejectAuth
            | Message::ListSubjectClient
            | Message::ListObjectClient
            | Message::GetCd => {},
            Message::PullFile { name } | Message::PushFile { name } => {
                let mut packed = PathBody::new_zeroed();
                write_str(&mut packed.path, name)?;
                emit(body, &packed);
            },
            Message::XferFile { data } => {
                if data.len() > DATA_LEN {
                    return Err(SpmError::BadMessage(format!(
                        "transfer chunk too large: {}",
                        data.len()
                    )));
                }
                let mut packed = XferFileBody::new_zeroed();
                packed.data[..data.len()].copy_from_slice(data);
                packed.size = U16::new(data.len() as u16);
                emit(body, &packed);
            },
            Message::ErrorServer { msg } => {
                let mut packed = ErrorBody::new_zeroed();
                write_str(&mut packed.msg, msg)?;
                emit(body, &packed);
            },
            Message::AuthSubject { subject, salt } => {
                let mut packed = AuthSubjectBody::new_zeroed();
                write_str(&mut packed.subject, subject)?;
                packed.salt = *salt;
                emit(body, &packed);
            },
            Message::ConfirmAuth { subject }
            | Message::ClearLinks { subject }
            | Message::DeleteSubject { subject } => {
                let mut packed = SubjectBody::new_zeroed();
                write_str(&mut packed.subject, subject)?;
                emit(body, &packed);
            },
            Message::ListSubjectServer { subjects } => {
                if subjects.len() > SUBJECTS_PER_FRAME {
                    return Err(SpmError::BadMessage("subject list overflow".to_string()));
                }
                let mut packed = SubjectListBody::new_zeroed();
                for (slot, name) in packed.subjects.iter_mut().zip(subjects) {
                    write_str(slot, name)?;
                }
                emit(body, &packed);
            },
            Message::ListObjectServer { paths } => {
                if paths.len() > OBJECTS_PER_FRAME {
                    return Err(SpmError::BadMessage("object list overflow".to_string()));
                }
                let mut packed = ObjectListBody::new_zeroed();
                for (slot, path) in packed.paths.iter_mut().zip(paths) {
                    write_str(slot, path)?;
                }
                emit(body, &packed);
            },
            Message::GiveTicketSubject {
                subject,
                ticket,
                target,
                is_object,
            }
            | Message::TakeTicketSubject {
                subject,
                ticket,
                target,
                is_object,
            } => {
                let mut packed = TicketOpBody::new_zeroed();
                write_str(&mut packed.subject, subject)?;
                write_str(&mut packed.ticket, ticket)?;
                write_str(&mut packed.target, target)?;
                packed.is_object = u8::from(*is_object);
                emit(body, &packed);
            },
            Message::XferTicket {
                from,
                to,
                ticket,
                target,
                is_object,
            } => {
                let mut packed = TicketXferBody::new_zeroed();
                write_str(&mut packed.from, from)?;
                write_str(&mut packed.to, to)?;
                write_str(&mut packed.ticket, ticket)?;
                write_str(&mut packed.target, target)?;
                packed.is_object = u8::from(*is_object);
                emit(body, &packed);
            },
            Message::MakeDirectory { dir } => {
                let mut packed = PathBody::new_zeroed();
                write_str(&mut packed.path, dir)?;
                emit(body, &packed);
            },
            Message::MakeSubject {
                subject,
                stype,
                password,
            } => {
                let mut packed = MakeSubjectBody::new_zeroed();
                write_str(&mut packed.subject, subject)?;
                write_str(&mut packed.stype, stype)?;
                write_str(&mut packed.password, password)?;
                emit(body, &packed);
            },
            Message::Cd { path } | Message::DeletePath { path } => {
                let mut packed = PathBody::new_zeroed();
                write_str(&mut packed.path, path)?;
                emit(body, &packed);
            },
            Message::MakeFilter {
                type1,
                type2,
                ticket,
            }
            | Message::DeleteFilter {
                type1,
                type2,
                ticket,
            } => {
                let mut packed = FilterBody::new_zeroed();
                write_str(&mut packed.type1, type1)?;
                write_str(&mut packed.type2, type2)?;
                write_str(&mut packed.ticket, ticket)?;
                emit(body, &packed);
            },
            Message::MakeLink { subject1, subject2 } => {
                let mut packed = LinkBody::new_zeroed();
                write_str(&mut packed.subject1, subject1)?;
                write_str(&mut packed.subject2, subject2)?;
                emit(body, &packed);
            },
        }
        Ok(())
    }

    /// Decode the body region for a known message type.
    pub fn decode_body(kind: MessageKind, body: &[u8]) -> Result<Self, SpmError> {
        Ok(match kind {
            MessageKind::HelloServer => {
                let packed: &HelloBody = view(body)?;
                Message::HelloServer {
                    version: packed.version.get(),
                }
            },
            MessageKind::HelloClient => {
                let packed: &HelloBody = view(body)?;
                Message::HelloClient {
                    version: packed.version.get(),
                }
            },
            MessageKind::Die => Message::Die,
            MessageKind::Okay => Message::Okay,
            MessageKind::RejectAuth => Message::RejectAuth,
            MessageKind::ListSubjectClient => Message::ListSubjectClient,
            MessageKind::ListObjectClient => Message::ListObjectClient,
            MessageKind::GetCd => Message::GetCd,
            MessageKind::PullFile => {
                let packed: &PathBody = view(body)?;
                Message::PullFile {
                    name: read_str(&packed.path)?,
                }
            },
            MessageKind::PushFile => {
                let packed: &PathBody = view(body)?;
                Message::PushFile {
                    name: read_str(&packed.path)?,
                }
            },
            MessageKind::XferFile => {
                let packed: &XferFileBody = view(body)?;
                let size = usize::from(packed.size.get());
                if size > DATA_LEN {
                    return Err(SpmError::BadMessage(format!(
                        "transfer chunk size out of range: {size}"
                    )));
                }
                Message::XferFile {
                    data: Bytes::copy_from_slice(&packed.data[..size]),
                }
            },
            MessageKind::ErrorServer => {
                let packed: &ErrorBody = view(body)?;
                Message::ErrorServer {
                    msg: read_str(&packed.msg)?,
                }
            },
            MessageKind::AuthSubject => {
                let packed: &AuthSubjectBody = view(body)?;
                Message::AuthSubject {
                    subject: read_str(&packed.subject)?,
                    salt: packed.salt,
                }
            },
            MessageKind::ConfirmAuth => {
                let packed: &SubjectBody = view(body)?;
                Message::ConfirmAuth {
                    subject: read_str(&packed.subject)?,
                }
            },
            MessageKind::ListSubjectServer => {
                let packed: &SubjectListBody = view(body)?;
                let mut subjects = Vec::new();
                for slot in &packed.subjects {
                    let name = read_str(slot)?;
                    if !name.is_empty() {
                        subjects.push(name);
                    }
                }
                Message::ListSubjectServer { subjects }
            },
            MessageKind::ListObjectServer => {
                let packed: &ObjectListBody = view(body)?;
                let mut paths = Vec::new();
                for slot in &packed.paths {
                    let path = read_str(slot)?;
                    if !path.is_empty() {
                        paths.push(path);
                    }
                }
                Message::ListObjectServer { paths }
            },
            MessageKind::GiveTicketSubject | MessageKind::TakeTicketSubject => {
                let packed: &TicketOpBody = view(body)?;
                let subject = read_str(&packed.subject)?;
                let ticket = read_str(&packed.ticket)?;
                let target = read_str(&packed.target)?;
                let is_object = packed.is_object != 0;
                if kind == MessageKind::GiveTicketSubject {
                    Message::GiveTicketSubject {
                        subject,
                        ticket,
                        target,
                        is_object,
                    }
                } else {
                    Message::TakeTicketSubject {
                        subject,
                        ticket,
                        target,
                        is_object,
                    }
                }
            },
            MessageKind::XferTicket => {
                let packed: &TicketXferBody = view(body)?;
                Message::XferTicket {
                    from: read_str(&packed.from)?,
                    to: read_str(&packed.to)?,
                    ticket: read_str(&packed.ticket)?,
                    target: read_str(&packed.target)?,
                    is_object: packed.is_object != 0,
                }
            },
            MessageKind::MakeDirectory => {
                let packed: &PathBody = view(body)?;
                Message::MakeDirectory {
                    dir: read_str(&packed.path)?,
                }
            },
            MessageKind::MakeSubject => {
                let packed: &MakeSubjectBody = view(body)?;
                Message::MakeSubject {
                    subject: read_str(&packed.subject)?,
                    stype: read_str(&packed.stype)?,
                    password: read_str(&packed.password)?,
                }
            },
            MessageKind::Cd => {
                let packed: &PathBody = view(body)?;
                Message::Cd {
                    path: read_str(&packed.path)?,
                }
            },
            MessageKind::MakeFilter | MessageKind::DeleteFilter => {
                let packed: &FilterBody = view(body)?;
                let type1 = read_str(&packed.type1)?;
                let type2 = read_str(&packed.type2)?;
                let ticket = read_str(&packed.ticket)?;
                if kind == MessageKind::MakeFilter {
                    Message::MakeFilter {
                        type1,
                        type2,
                        ticket,
                    }
                } else {
                    Message::DeleteFilter {
                        type1,
                        type2,
                        ticket,
                    }
                }
            },
            MessageKind::MakeLink => {
                let packed: &LinkBody = view(body)?;
                Message::MakeLink {
                    subject1: read_str(&packed.subject1)?,
                    subject2: read_str(&packed.subject2)?,
                }
            },
            MessageKind::DeletePath => {
                let packed: &PathBody = view(body)?;
                Message::DeletePath {
                    path: read_str(&packed.path)?,
                }
            },
            MessageKind::ClearLinks => {
                let packed: &SubjectBody = view(body)?;
                Message::ClearLinks {
                    subject: read_str(&packed.subject)?,
                }
            },
            MessageKind::DeleteSubject => {
                let packed: &SubjectBody = view(body)?;
                Message::DeleteSubject {
                    subject: read_str(&packed.subject)?,
                }
            },
        })
    }
}
