// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-connection state machine.
//!
//! A session starts in `Greeting`, moves to `Unauth` after the version
//! exchange, and reaches `Auth` only through a successful `AUTH_SUBJECT`.
//! File uploads put the session into `Pulling` until the client's
//! terminating `OKAY`; downloads stream inline (`Pushing`) and return to
//! `Auth` before the next frame is read. Frames are processed strictly in
//! arrival order.

use std::{sync::Arc, time::Duration};

use rand::RngExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    cfg::config::Config,
    crypto::{SessionCrypto, kdf, keystream::KEY_LEN},
    errors::SpmError,
    models::{
        DATA_LEN, FRAME_LEN, OBJECTS_PER_FRAME, PROTOCOL_VERSION, SALT_LEN,
        SUBJECTS_PER_FRAME, frame, message::Message,
    },
    server::connection::FrameSink,
    session::enforce,
    store::{Store, SubjectRec},
    tickets::Ticket,
    utils::{normalize_path, parent_dir},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Greeting,
    Unauth,
    Auth,
    /// Receiving an upload: only `XFER_FILE` and the closing `OKAY` are
    /// legal.
    Pulling,
    /// Streaming a download to the client; never observed by dispatch.
    Pushing,
    Closing,
}

/// What the connection loop should do after a frame has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct Session {
    store: Arc<Store>,
    cfg: Arc<Config>,
    peer: String,
    phase: Phase,
    subject: Option<SubjectRec>,
    crypto: Option<SessionCrypto>,
    cwd: String,
    xfer: Option<tokio::fs::File>,
}

impl Session {
    pub fn new(store: Arc<Store>, cfg: Arc<Config>, peer: String) -> Self {
        Self {
            store,
            cfg,
            peer,
            phase: Phase::Greeting,
            subject: None,
            crypto: None,
            cwd: "/".to_string(),
            xfer: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Parse one raw frame and run it through the state machine.
    pub async fn handle_block(
        &mut self,
        raw: &[u8; FRAME_LEN],
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        let msg = frame::parse(raw, self.crypto.as_mut())?;
        debug!(peer = %self.peer, kind = ?msg.kind(), phase = ?self.phase, "dispatch");
        let result = self.dispatch(msg, sink).await;
        if let Err(SpmError::Io(_)) = &result {
            // A failed disk read/write aborts the transfer but not the
            // session.
            self.abort_transfer();
        }
        result
    }

    fn abort_transfer(&mut self) {
        self.xfer = None;
        if matches!(self.phase, Phase::Pulling | Phase::Pushing) {
            self.phase = Phase::Auth;
        }
    }

    async fn dispatch(&mut self, msg: Message, sink: &FrameSink) -> Result<Flow, SpmError> {
        match self.phase {
            Phase::Greeting => self.on_greeting(msg, sink).await,
            Phase::Unauth => self.on_unauth(msg, sink).await,
            Phase::Auth => self.on_auth(msg, sink).await,
            Phase::Pulling => self.on_pulling(msg).await,
            Phase::Pushing | Phase::Closing => Err(SpmError::AmbiguousSequence),
        }
    }

    // -------- outbound helpers --------

    async fn send(&mut self, sink: &FrameSink, msg: &Message) -> Result<(), SpmError> {
        let frame = frame::build(msg, self.crypto.as_mut())?;
        sink.send(&frame).await?;
        Ok(())
    }

    async fn send_okay(&mut self, sink: &FrameSink) -> Result<(), SpmError> {
        self.send(sink, &Message::Okay).await
    }

    /// Best-effort `ERROR_SERVER`; failures to report are swallowed.
    pub async fn send_error(&mut self, sink: &FrameSink, text: &str) {
        let msg = Message::ErrorServer {
            msg: text.to_string(),
        };
        if let Ok(frame) = frame::build(&msg, self.crypto.as_mut()) {
            let _ = sink.send(&frame).await;
        }
    }

    /// Terminal `DIE`, sealed when a key is installed.
    pub async fn send_die(&mut self, sink: &FrameSink) {
        if let Ok(frame) = frame::build(&Message::Die, self.crypto.as_mut()) {
            let _ = sink.send(&frame).await;
        }
        self.phase = Phase::Closing;
    }

    // -------- greeting / authentication --------

    async fn on_greeting(&mut self, msg: Message, sink: &FrameSink) -> Result<Flow, SpmError> {
        match msg {
            Message::HelloClient { version } => {
                info!(peer = %self.peer, version, "client hello");
                if version != PROTOCOL_VERSION {
                    return Err(SpmError::VersionMismatch {
                        client: version,
                        server: PROTOCOL_VERSION,
                    });
                }
                self.send(sink, &Message::HelloServer {
                    version: PROTOCOL_VERSION,
                })
                .await?;
                self.phase = Phase::Unauth;
                Ok(Flow::Continue)
            },
            Message::Die => Ok(Flow::Close),
            _ => Err(SpmError::BadMessage("expected HELLO_CLIENT".to_string())),
        }
    }

    async fn on_unauth(&mut self, msg: Message, sink: &FrameSink) -> Result<Flow, SpmError> {
        match msg {
            Message::AuthSubject { subject, salt } => {
                self.authenticate(subject, salt, sink).await
            },
            Message::Die => Ok(Flow::Close),
            _ => Err(SpmError::AmbiguousSequence),
        }
    }

    async fn authenticate(
        &mut self,
        subject: String,
        salt: [u8; SALT_LEN],
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        // The delay lands before the lookup result is observable, whether
        // the subject exists or not.
        let jitter = rand::rng().random_range(0..self.cfg.auth.login_jitter_ms.max(1));
        tokio::time::sleep(Duration::from_millis(self.cfg.auth.login_delay_ms + jitter))
            .await;
        if subject.is_empty() {
            return Err(SpmError::Refused("Missing target or salt".to_string()));
        }
        match self.store.db.get_subject(&subject)? {
            Some(rec) => {
                let secret = hex::decode(&rec.secret_hex).map_err(|_| {
                    SpmError::Refused("DatabaseError: corrupt stored secret".to_string())
                })?;
                let key = kdf::session_key(&secret, &salt);
                self.crypto = Some(SessionCrypto::new(&key)?);
                let name = rec.name.clone();
                self.subject = Some(rec);
                self.phase = Phase::Auth;
                info!(peer = %self.peer, subject = %name, "authenticated");
                self.send(sink, &Message::ConfirmAuth { subject: name }).await?;
                Ok(Flow::Continue)
            },
            None => {
                // Reject by confirming under a key the client cannot
                // derive; its next frame fails the MAC and the connection
                // dies. Indistinguishable on the wire from a success.
                let mut key = [0u8; KEY_LEN];
                rand::rng().fill(&mut key[..]);
                self.crypto = Some(SessionCrypto::new(&key)?);
                warn!(peer = %self.peer, %subject, "auth attempt for unknown subject");
                self.send(sink, &Message::ConfirmAuth { subject }).await?;
                Ok(Flow::Continue)
            },
        }
    }

    // -------- authenticated dispatch --------

    async fn on_auth(&mut self, msg: Message, sink: &FrameSink) -> Result<Flow, SpmError> {
        match msg {
            Message::Die => Ok(Flow::Close),
            Message::Okay => {
                // Stray transfer terminator; drop any leftover handle.
                self.xfer = None;
                Ok(Flow::Continue)
            },
            Message::ListSubjectClient => self.list_subjects(sink).await,
            Message::ListObjectClient => self.list_objects(sink).await,
            Message::Cd { path } => self.change_dir(&path, sink).await,
            Message::GetCd => {
                let cwd = self.cwd.clone();
                self.send(sink, &Message::Cd { path: cwd }).await?;
                Ok(Flow::Continue)
            },
            Message::PushFile { name } => self.begin_push(&name, sink).await,
            Message::PullFile { name } => self.serve_pull(&name, sink).await,
            Message::MakeDirectory { dir } => self.make_directory(&dir, sink).await,
            Message::MakeSubject {
                subject,
                stype,
                password,
            } => self.make_subject(&subject, &stype, &password, sink).await,
            Message::DeleteSubject { subject } => self.delete_subject(&subject, sink).await,
            Message::MakeLink { subject1, subject2 } => {
                self.make_link(&subject1, &subject2, sink).await
            },
            Message::ClearLinks { subject } => self.clear_links(&subject, sink).await,
            Message::MakeFilter {
                type1,
                type2,
                ticket,
            } => self.make_filter(&type1, &type2, &ticket, sink).await,
            Message::DeleteFilter {
                type1,
                type2,
                ticket,
            } => self.delete_filter(&type1, &type2, &ticket, sink).await,
            Message::GiveTicketSubject {
                subject,
                ticket,
                target,
                is_object,
            } => {
                self.grant_ticket(&subject, &ticket, &target, is_object, true, sink)
                    .await
            },
            Message::TakeTicketSubject {
                subject,
                ticket,
                target,
                is_object,
            } => {
                self.grant_ticket(&subject, &ticket, &target, is_object, false, sink)
                    .await
            },
            Message::XferTicket {
                from,
                to,
                ticket,
                target,
                is_object,
            } => {
                self.xfer_ticket(&from, &to, &ticket, &target, is_object, sink)
                    .await
            },
            Message::DeletePath { path } => self.delete_path(&path, sink).await,
            _ => Err(SpmError::AmbiguousSequence),
        }
    }

    async fn on_pulling(&mut self, msg: Message) -> Result<Flow, SpmError> {
        match msg {
            Message::XferFile { data } => {
                let file = self.xfer.as_mut().ok_or(SpmError::AmbiguousSequence)?;
                file.write_all(&data).await?;
                Ok(Flow::Continue)
            },
            Message::Okay => {
                if let Some(mut file) = self.xfer.take() {
                    file.flush().await?;
                }
                self.phase = Phase::Auth;
                Ok(Flow::Continue)
            },
            _ => Err(SpmError::AmbiguousSequence),
        }
    }

    // -------- listings and navigation --------

    async fn list_subjects(&mut self, sink: &FrameSink) -> Result<Flow, SpmError> {
        let names = self.store.db.subject_names()?;
        for chunk in names.chunks(SUBJECTS_PER_FRAME) {
            self.send(sink, &Message::ListSubjectServer {
                subjects: chunk.to_vec(),
            })
            .await?;
        }
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn list_objects(&mut self, sink: &FrameSink) -> Result<Flow, SpmError> {
        let paths = self.store.db.children(&self.cwd)?;
        for chunk in paths.chunks(OBJECTS_PER_FRAME) {
            self.send(sink, &Message::ListObjectServer {
                paths: chunk.to_vec(),
            })
            .await?;
        }
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn change_dir(&mut self, path: &str, sink: &FrameSink) -> Result<Flow, SpmError> {
        let resolved = normalize_path(&self.cwd, path);
        let is_dir = resolved == "/"
            || matches!(self.store.db.get_object(&resolved)?, Some(rec) if rec.is_dir);
        if !is_dir {
            return Err(SpmError::Refused(
                "Path does not appear to exist".to_string(),
            ));
        }
        self.cwd = resolved;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    // -------- file transfer --------

    async fn begin_push(&mut self, name: &str, sink: &FrameSink) -> Result<Flow, SpmError> {
        let localpath = normalize_path(&self.cwd, name);
        if self.cfg.server.enforce_rights {
            enforce::check_write(&self.store.db, self.actor()?, parent_dir(&localpath))?;
        }
        if self.store.db.get_object(&localpath)?.is_some() {
            return Err(SpmError::Refused("Object already exists".to_string()));
        }
        self.store.db.insert_object(&localpath, false)?;
        self.xfer = Some(self.store.objects.open_write(&localpath).await?);
        self.phase = Phase::Pulling;
        self.send_okay(sink).await?;
        info!(peer = %self.peer, path = %localpath, "receiving upload");
        Ok(Flow::Continue)
    }

    async fn serve_pull(&mut self, name: &str, sink: &FrameSink) -> Result<Flow, SpmError> {
        let localpath = normalize_path(&self.cwd, name);
        if self.cfg.server.enforce_rights {
            enforce::check_read(&self.store.db, self.actor()?, &localpath)?;
        }
        if self.store.db.get_object(&localpath)?.is_none() {
            return Err(SpmError::Refused("Object does not exist".to_string()));
        }
        if !self.store.objects.is_file(&localpath) {
            return Err(SpmError::Refused(
                "Not a valid file for reading".to_string(),
            ));
        }
        let mut file = self.store.objects.open_read(&localpath).await?;
        self.phase = Phase::Pushing;
        self.send_okay(sink).await?;
        let mut buf = vec![0u8; DATA_LEN];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let chunk = Message::XferFile {
                data: bytes::Bytes::copy_from_slice(&buf[..n]),
            };
            self.send(sink, &chunk).await?;
        }
        self.send_okay(sink).await?;
        self.phase = Phase::Auth;
        info!(peer = %self.peer, path = %localpath, "served download");
        Ok(Flow::Continue)
    }

    // -------- administrative operations --------

    async fn make_directory(&mut self, dir: &str, sink: &FrameSink) -> Result<Flow, SpmError> {
        let localpath = normalize_path(&self.cwd, dir);
        if self.cfg.server.enforce_rights {
            enforce::check_write(&self.store.db, self.actor()?, parent_dir(&localpath))?;
        }
        if self.store.db.get_object(&localpath)?.is_some()
            || self.store.objects.exists(&localpath)
        {
            return Err(SpmError::Refused("Path already exists".to_string()));
        }
        self.store.insert_object(&localpath, true)?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn make_subject(
        &mut self,
        subject: &str,
        stype: &str,
        password: &str,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        if self.cfg.server.enforce_rights {
            enforce::require_super(self.actor()?)?;
        }
        if password.len() <= self.cfg.auth.min_password_len {
            return Err(SpmError::Refused("Password is way too short".to_string()));
        }
        if stype.is_empty() {
            return Err(SpmError::Refused("Subject must have a type".to_string()));
        }
        if self.store.db.get_subject(subject)?.is_some() {
            return Err(SpmError::Refused("Subject already exists".to_string()));
        }
        let secret = hex::encode(kdf::stored_secret(subject, password));
        self.store.db.insert_subject(subject, &secret, stype, false)?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn delete_subject(
        &mut self,
        subject: &str,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        if subject.is_empty() {
            return Err(SpmError::Refused("A subject is required".to_string()));
        }
        if self.cfg.server.enforce_rights {
            enforce::require_super(self.actor()?)?;
        }
        self.store.db.delete_subject(subject)?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn make_link(
        &mut self,
        subject1: &str,
        subject2: &str,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        if self.cfg.server.enforce_rights {
            enforce::require_super(self.actor()?)?;
        }
        self.store.db.insert_link(subject1, subject2)?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn clear_links(&mut self, subject: &str, sink: &FrameSink) -> Result<Flow, SpmError> {
        if subject.is_empty() {
            return Err(SpmError::Refused("A subject is required".to_string()));
        }
        if self.cfg.server.enforce_rights {
            enforce::require_super(self.actor()?)?;
        }
        self.store.db.clear_links(subject)?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn make_filter(
        &mut self,
        type1: &str,
        type2: &str,
        ticket: &str,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        let ticket = Ticket::parse(ticket)?;
        if self.cfg.server.enforce_rights {
            enforce::require_super(self.actor()?)?;
        }
        self.store
            .db
            .insert_filter(type1, type2, &ticket.to_string())?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn delete_filter(
        &mut self,
        type1: &str,
        type2: &str,
        ticket: &str,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        let ticket = Ticket::parse(ticket)?;
        if self.cfg.server.enforce_rights {
            enforce::require_super(self.actor()?)?;
        }
        self.store
            .db
            .delete_filter(type1, type2, &ticket.to_string())?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn grant_ticket(
        &mut self,
        subject: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
        give: bool,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        let ticket = Ticket::parse(ticket)?;
        let target = self.resolve_ticket_target(target, is_object)?;
        if self.store.db.get_subject(subject)?.is_none() {
            return Err(SpmError::Refused("No such subject".to_string()));
        }
        if self.cfg.server.enforce_rights {
            let actor = self.actor()?;
            if give {
                enforce::check_give(&self.store.db, actor, &target, is_object)?;
            } else {
                enforce::check_take(&self.store.db, actor, &target, is_object)?;
            }
        }
        let wire = ticket.to_string();
        if give {
            self.store.db.insert_right(subject, &wire, &target, is_object)?;
        } else {
            self.store.db.delete_right(subject, &wire, &target, is_object)?;
        }
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn xfer_ticket(
        &mut self,
        from: &str,
        to: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
        sink: &FrameSink,
    ) -> Result<Flow, SpmError> {
        let ticket = Ticket::parse(ticket)?;
        let from_rec = self
            .store
            .db
            .get_subject(from)?
            .ok_or_else(|| SpmError::Refused("No such subject".to_string()))?;
        let to_rec = self
            .store
            .db
            .get_subject(to)?
            .ok_or_else(|| SpmError::Refused("No such subject".to_string()))?;
        let target = self.resolve_ticket_target(target, is_object)?;
        if self.cfg.server.enforce_rights {
            enforce::check_xfer(&self.store.db, self.actor()?, &from_rec, &to_rec, ticket)?;
        }
        self.store.db.transfer_right(
            &from_rec.name,
            &to_rec.name,
            &ticket.to_string(),
            &target,
            is_object,
        )?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    async fn delete_path(&mut self, path: &str, sink: &FrameSink) -> Result<Flow, SpmError> {
        let localpath = normalize_path(&self.cwd, path);
        if self.cfg.server.enforce_rights {
            enforce::check_write(&self.store.db, self.actor()?, parent_dir(&localpath))?;
        }
        self.store.delete_path(&localpath)?;
        self.send_okay(sink).await?;
        Ok(Flow::Continue)
    }

    fn actor(&self) -> Result<&SubjectRec, SpmError> {
        self.subject.as_ref().ok_or(SpmError::AmbiguousSequence)
    }

    fn resolve_ticket_target(
        &self,
        target: &str,
        is_object: bool,
    ) -> Result<String, SpmError> {
        if is_object {
            let path = normalize_path(&self.cwd, target);
            if !self.store.objects.exists(&path) {
                return Err(SpmError::Refused("No such target object".to_string()));
            }
            Ok(path)
        } else {
            match self.store.db.get_subject(target)? {
                Some(rec) => Ok(rec.name),
                None => Err(SpmError::Refused("No such subject".to_string())),
            }
        }
    }
}
