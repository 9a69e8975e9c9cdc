// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client half of the protocol.
//!
//! One method per operation the daemon exposes. The client owns the socket
//! and is driven from a single task, so sends and receives are naturally
//! ordered; the session keystream stays in lockstep with the server's.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::RngExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tracing::debug;

use crate::{
    crypto::{SessionCrypto, kdf},
    models::{DATA_LEN, FRAME_LEN, PROTOCOL_VERSION, SALT_LEN, frame, message::Message},
    utils::normalize_path,
};

/// A connection to an SPM daemon.
pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    crypto: Option<SessionCrypto>,
    cwd: String,
}

impl Client {
    /// Establish the TCP connection. The protocol exchange starts with
    /// [`Client::greet`].
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context("failed to connect to the daemon")?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            writer,
            crypto: None,
            cwd: "/".to_string(),
        })
    }

    /// The working directory as last confirmed by the server.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    async fn send(&mut self, msg: &Message) -> Result<()> {
        let frame = frame::build(msg, self.crypto.as_mut())?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message> {
        let mut raw = [0u8; FRAME_LEN];
        self.reader.read_exact(&mut raw).await?;
        let msg = frame::parse(&raw, self.crypto.as_mut())?;
        debug!(kind = ?msg.kind(), "received");
        Ok(msg)
    }

    async fn expect_okay(&mut self) -> Result<()> {
        match self.recv().await? {
            Message::Okay => Ok(()),
            Message::ErrorServer { msg } => bail!("server error: {msg}"),
            other => bail!("unexpected reply: {:?}", other.kind()),
        }
    }

    /// Exchange version greetings.
    pub async fn greet(&mut self) -> Result<()> {
        self.send(&Message::HelloClient {
            version: PROTOCOL_VERSION,
        })
        .await?;
        match self.recv().await? {
            Message::HelloServer { version } if version == PROTOCOL_VERSION => Ok(()),
            Message::HelloServer { version } => {
                bail!("server speaks protocol version {version}")
            },
            Message::ErrorServer { msg } => bail!("server error: {msg}"),
            other => bail!("unexpected greeting reply: {:?}", other.kind()),
        }
    }

    /// Log in. On success every following frame is sealed under the
    /// derived session key. A wrong password or unknown subject surfaces
    /// as a failure to open the server's confirmation.
    pub async fn authenticate(&mut self, subject: &str, password: &str) -> Result<()> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt[..]);
        self.send(&Message::AuthSubject {
            subject: subject.to_string(),
            salt,
        })
        .await?;
        let secret = kdf::stored_secret(subject, password);
        let key = kdf::session_key(&secret, &salt);
        self.crypto = Some(SessionCrypto::new(&key)?);
        match self
            .recv()
            .await
            .context("authentication rejected by server")?
        {
            Message::ConfirmAuth { subject: confirmed } if confirmed == subject => Ok(()),
            Message::ConfirmAuth { subject: confirmed } => {
                bail!("server confirmed a different subject: {confirmed}")
            },
            other => bail!("unexpected reply to authentication: {:?}", other.kind()),
        }
    }

    /// All subject names known to the daemon.
    pub async fn list_subjects(&mut self) -> Result<Vec<String>> {
        self.send(&Message::ListSubjectClient).await?;
        let mut subjects = Vec::new();
        loop {
            match self.recv().await? {
                Message::ListSubjectServer { subjects: batch } => subjects.extend(batch),
                Message::Okay => return Ok(subjects),
                Message::ErrorServer { msg } => bail!("server error: {msg}"),
                other => bail!("unexpected listing reply: {:?}", other.kind()),
            }
        }
    }

    /// Objects in the remote working directory.
    pub async fn list_objects(&mut self) -> Result<Vec<String>> {
        self.send(&Message::ListObjectClient).await?;
        let mut paths = Vec::new();
        loop {
            match self.recv().await? {
                Message::ListObjectServer { paths: batch } => paths.extend(batch),
                Message::Okay => return Ok(paths),
                Message::ErrorServer { msg } => bail!("server error: {msg}"),
                other => bail!("unexpected listing reply: {:?}", other.kind()),
            }
        }
    }

    /// Change the remote working directory.
    pub async fn cd(&mut self, path: &str) -> Result<()> {
        self.send(&Message::Cd {
            path: path.to_string(),
        })
        .await?;
        self.expect_okay().await?;
        self.cwd = normalize_path(&self.cwd, path);
        Ok(())
    }

    /// Ask the server for its view of the working directory.
    pub async fn pwd(&mut self) -> Result<String> {
        self.send(&Message::GetCd).await?;
        match self.recv().await? {
            Message::Cd { path } => Ok(path),
            Message::ErrorServer { msg } => bail!("server error: {msg}"),
            other => bail!("unexpected pwd reply: {:?}", other.kind()),
        }
    }

    /// Upload a local file under the given remote name.
    pub async fn push_file(&mut self, local: impl AsRef<Path>, remote: &str) -> Result<()> {
        let local = local.as_ref();
        let mut file = tokio::fs::File::open(local)
            .await
            .with_context(|| format!("cannot open {}", local.display()))?;
        self.send(&Message::PushFile {
            name: remote.to_string(),
        })
        .await?;
        self.expect_okay().await?;
        let mut buf = vec![0u8; DATA_LEN];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.send(&Message::XferFile {
                data: bytes::Bytes::copy_from_slice(&buf[..n]),
            })
            .await?;
        }
        self.send(&Message::Okay).await?;
        Ok(())
    }

    /// Download a remote file into a fresh local path.
    pub async fn pull_file(&mut self, remote: &str, local: impl AsRef<Path>) -> Result<()> {
        let local = local.as_ref();
        if tokio::fs::try_exists(local).await? {
            bail!("local file already exists: {}", local.display());
        }
        self.send(&Message::PullFile {
            name: remote.to_string(),
        })
        .await?;
        self.expect_okay().await?;
        let mut file = tokio::fs::File::create(local).await?;
        loop {
            match self.recv().await? {
                Message::XferFile { data } => file.write_all(&data).await?,
                Message::Okay => break,
                Message::ErrorServer { msg } => bail!("server error during pull: {msg}"),
                other => bail!("unexpected transfer reply: {:?}", other.kind()),
            }
        }
        file.flush().await?;
        Ok(())
    }

    pub async fn make_directory(&mut self, dir: &str) -> Result<()> {
        self.send(&Message::MakeDirectory {
            dir: dir.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn delete_path(&mut self, path: &str) -> Result<()> {
        self.send(&Message::DeletePath {
            path: path.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn make_subject(
        &mut self,
        subject: &str,
        stype: &str,
        password: &str,
    ) -> Result<()> {
        self.send(&Message::MakeSubject {
            subject: subject.to_string(),
            stype: stype.to_string(),
            password: password.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn delete_subject(&mut self, subject: &str) -> Result<()> {
        self.send(&Message::DeleteSubject {
            subject: subject.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn make_link(&mut self, subject1: &str, subject2: &str) -> Result<()> {
        self.send(&Message::MakeLink {
            subject1: subject1.to_string(),
            subject2: subject2.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn clear_links(&mut self, subject: &str) -> Result<()> {
        self.send(&Message::ClearLinks {
            subject: subject.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn make_filter(
        &mut self,
        type1: &str,
        type2: &str,
        ticket: &str,
    ) -> Result<()> {
        self.send(&Message::MakeFilter {
            type1: type1.to_string(),
            type2: type2.to_string(),
            ticket: ticket.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn delete_filter(
        &mut self,
        type1: &str,
        type2: &str,
        ticket: &str,
    ) -> Result<()> {
        self.send(&Message::DeleteFilter {
            type1: type1.to_string(),
            type2: type2.to_string(),
            ticket: ticket.to_string(),
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn give_ticket(
        &mut self,
        subject: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<()> {
        self.send(&Message::GiveTicketSubject {
            subject: subject.to_string(),
            ticket: ticket.to_string(),
            target: target.to_string(),
            is_object,
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn take_ticket(
        &mut self,
        subject: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<()> {
        self.send(&Message::TakeTicketSubject {
            subject: subject.to_string(),
            ticket: ticket.to_string(),
            target: target.to_string(),
            is_object,
        })
        .await?;
        self.expect_okay().await
    }

    pub async fn xfer_ticket(
        &mut self,
        from: &str,
        to: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<()> {
        self.send(&Message::XferTicket {
            from: from.to_string(),
            to: to.to_string(),
            ticket: ticket.to_string(),
            target: target.to_string(),
            is_object,
        })
        .await?;
        self.expect_okay().await
    }

    /// Tell the daemon to drop the connection.
    pub async fn die(mut self) -> Result<()> {
        self.send(&Message::Die).await?;
        Ok(())
    }
}
