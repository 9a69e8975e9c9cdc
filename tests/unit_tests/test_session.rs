// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use spmd_rs::{
    cfg::config::Config,
    crypto::{SessionCrypto, kdf},
    errors::SpmError,
    models::{FRAME_LEN, PROTOCOL_VERSION, SALT_LEN, frame, message::Message},
    server::connection::FrameSink,
    session::handler::{Flow, Phase, Session},
    store::Store,
};
use tempfile::TempDir;
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream, tcp::OwnedReadHalf},
};

/// A session wired to a real socket pair so replies can be read back from
/// the client end, without the acceptor in between.
struct Rig {
    session: Session,
    sink: FrameSink,
    client: TcpStream,
    store: Arc<Store>,
    _server_read: OwnedReadHalf,
    _root: TempDir,
}

async fn rig(enforce: bool) -> Rig {
    let root = tempfile::tempdir().expect("tempdir");
    let store =
        Arc::new(Store::open_ephemeral(&root.path().join("fileroot")).expect("store"));
    for (name, stype, password, is_super) in [
        ("admin", "main", "password", true),
        ("alice", "user", "secret1234", false),
    ] {
        let secret = hex::encode(kdf::stored_secret(name, password));
        store
            .db
            .insert_subject(name, &secret, stype, is_super)
            .expect("seed subject");
    }

    let mut cfg = Config::default();
    cfg.server.enforce_rights = enforce;
    cfg.auth.login_delay_ms = 0;
    cfg.auth.login_jitter_ms = 1;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let client = TcpStream::connect(addr).await.expect("connect");
    let (server_stream, _) = listener.accept().await.expect("accept");
    let (server_read, server_write) = server_stream.into_split();

    Rig {
        session: Session::new(Arc::clone(&store), Arc::new(cfg), "test".to_string()),
        sink: FrameSink::new(server_write),
        client,
        store,
        _server_read: server_read,
        _root: root,
    }
}

impl Rig {
    async fn feed(
        &mut self,
        msg: &Message,
        crypto: Option<&mut SessionCrypto>,
    ) -> Result<Flow, SpmError> {
        let raw = frame::build(msg, crypto).expect("build frame");
        self.session.handle_block(&raw, &self.sink).await
    }

    async fn read_reply(&mut self, crypto: Option<&mut SessionCrypto>) -> Message {
        let mut raw = [0u8; FRAME_LEN];
        self.client.read_exact(&mut raw).await.expect("read reply");
        frame::parse(&raw, crypto).expect("parse reply")
    }

    async fn login(&mut self, subject: &str, password: &str) -> SessionCrypto {
        let flow = self
            .feed(
                &Message::HelloClient {
                    version: PROTOCOL_VERSION,
                },
                None,
            )
            .await
            .expect("greeting");
        assert_eq!(flow, Flow::Continue);
        assert!(matches!(
            self.read_reply(None).await,
            Message::HelloServer { .. }
        ));

        let salt = [0x11u8; SALT_LEN];
        self.feed(
            &Message::AuthSubject {
                subject: subject.to_string(),
                salt,
            },
            None,
        )
        .await
        .expect("auth");
        let secret = kdf::stored_secret(subject, password);
        let mut crypto =
            SessionCrypto::new(&kdf::session_key(&secret, &salt)).expect("crypto");
        match self.read_reply(Some(&mut crypto)).await {
            Message::ConfirmAuth { subject: confirmed } => {
                assert_eq!(confirmed, subject)
            },
            other => panic!("expected CONFIRM_AUTH, got {:?}", other.kind()),
        }
        assert_eq!(self.session.phase(), Phase::Auth);
        crypto
    }

    /// Feed a private frame and expect the plain `OKAY` reply.
    async fn roundtrip_okay(&mut self, msg: &Message, crypto: &mut SessionCrypto) {
        let flow = self.feed(msg, Some(&mut *crypto)).await.expect("dispatch");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(self.read_reply(Some(&mut *crypto)).await, Message::Okay);
    }
}

#[tokio::test]
async fn test_version_mismatch_closes() {
    let mut rig = rig(true).await;
    let err = rig
        .feed(&Message::HelloClient { version: 99 }, None)
        .await
        .expect_err("mismatch");
    assert!(matches!(err, SpmError::VersionMismatch { .. }));
    assert!(err.closes_connection());
    assert_eq!(err.wire_text(), "Version mismatch.");
}

#[tokio::test]
async fn test_private_frame_before_auth_is_rejected() {
    let mut rig = rig(true).await;
    let mut stray = SessionCrypto::new(&[7u8; 256]).expect("crypto");
    let err = rig
        .feed(&Message::ListSubjectClient, Some(&mut stray))
        .await
        .expect_err("auth gate");
    assert!(matches!(err, SpmError::BadMessage(_)));
    assert!(err.closes_connection());
}

#[tokio::test]
async fn test_unknown_subject_gets_undecryptable_confirmation() {
    let mut rig = rig(true).await;
    rig.feed(
        &Message::HelloClient {
            version: PROTOCOL_VERSION,
        },
        None,
    )
    .await
    .expect("greeting");
    rig.read_reply(None).await;

    let salt = [0x22u8; SALT_LEN];
    let flow = rig
        .feed(
            &Message::AuthSubject {
                subject: "mallory".to_string(),
                salt,
            },
            None,
        )
        .await
        .expect("fake auth still answers");
    assert_eq!(flow, Flow::Continue);
    // The session did not authenticate.
    assert_eq!(rig.session.phase(), Phase::Unauth);

    // The confirmation cannot be opened with the key the client derives.
    let secret = kdf::stored_secret("mallory", "whatever");
    let mut crypto =
        SessionCrypto::new(&kdf::session_key(&secret, &salt)).expect("crypto");
    let mut raw = [0u8; FRAME_LEN];
    rig.client.read_exact(&mut raw).await.expect("read");
    assert!(frame::parse(&raw, Some(&mut crypto)).is_err());

    // And the next client frame dies at the MAC check.
    let err = rig
        .feed(&Message::ListSubjectClient, Some(&mut crypto))
        .await
        .expect_err("desynced client");
    assert!(matches!(err, SpmError::BadMessage(_)));
}

#[tokio::test]
async fn test_admin_operations_and_navigation() {
    let mut rig = rig(true).await;
    let mut crypto = rig.login("admin", "password").await;

    rig.roundtrip_okay(
        &Message::MakeSubject {
            subject: "bob".to_string(),
            stype: "user".to_string(),
            password: "hunter2hunter2".to_string(),
        },
        &mut crypto,
    )
    .await;
    assert!(rig.store.db.get_subject("bob").expect("query").is_some());

    // Short passwords are refused but keep the session alive.
    let err = rig
        .feed(
            &Message::MakeSubject {
                subject: "carl".to_string(),
                stype: "user".to_string(),
                password: "short".to_string(),
            },
            Some(&mut crypto),
        )
        .await
        .expect_err("short password");
    assert_eq!(err.wire_text(), "Password is way too short");
    assert!(!err.closes_connection());

    rig.roundtrip_okay(
        &Message::MakeDirectory {
            dir: "/docs".to_string(),
        },
        &mut crypto,
    )
    .await;
    rig.roundtrip_okay(
        &Message::Cd {
            path: "docs".to_string(),
        },
        &mut crypto,
    )
    .await;

    let flow = rig
        .feed(&Message::GetCd, Some(&mut crypto))
        .await
        .expect("get cd");
    assert_eq!(flow, Flow::Continue);
    assert_eq!(
        rig.read_reply(Some(&mut crypto)).await,
        Message::Cd {
            path: "/docs".to_string()
        }
    );

    let err = rig
        .feed(
            &Message::Cd {
                path: "/nowhere".to_string(),
            },
            Some(&mut crypto),
        )
        .await
        .expect_err("missing dir");
    assert_eq!(err.wire_text(), "Path does not appear to exist");
    assert!(!err.closes_connection());

    // Subject listing arrives chunked, then OKAY.
    let flow = rig
        .feed(&Message::ListSubjectClient, Some(&mut crypto))
        .await
        .expect("listing");
    assert_eq!(flow, Flow::Continue);
    assert_eq!(
        rig.read_reply(Some(&mut crypto)).await,
        Message::ListSubjectServer {
            subjects: vec![
                "admin".to_string(),
                "alice".to_string(),
                "bob".to_string()
            ]
        }
    );
    assert_eq!(rig.read_reply(Some(&mut crypto)).await, Message::Okay);
}

#[tokio::test]
async fn test_upload_and_transfer_mode_exclusivity() {
    let mut rig = rig(true).await;
    let mut crypto = rig.login("admin", "password").await;

    rig.roundtrip_okay(
        &Message::PushFile {
            name: "x.bin".to_string(),
        },
        &mut crypto,
    )
    .await;
    assert_eq!(rig.session.phase(), Phase::Pulling);

    let payload = bytes::Bytes::from(vec![0xabu8; 3000]);
    for chunk in payload.chunks(2024) {
        let flow = rig
            .feed(
                &Message::XferFile {
                    data: bytes::Bytes::copy_from_slice(chunk),
                },
                Some(&mut crypto),
            )
            .await
            .expect("chunk");
        assert_eq!(flow, Flow::Continue);
    }
    let flow = rig
        .feed(&Message::Okay, Some(&mut crypto))
        .await
        .expect("terminator");
    assert_eq!(flow, Flow::Continue);
    assert_eq!(rig.session.phase(), Phase::Auth);

    let written = std::fs::read(rig.store.objects.resolve("/x.bin")).expect("file");
    assert_eq!(written, payload);
    assert!(rig.store.db.get_object("/x.bin").expect("query").is_some());

    // Back in transfer mode, anything but XFER_FILE/OKAY kills the
    // connection.
    rig.roundtrip_okay(
        &Message::PushFile {
            name: "y.bin".to_string(),
        },
        &mut crypto,
    )
    .await;
    let err = rig
        .feed(&Message::ListSubjectClient, Some(&mut crypto))
        .await
        .expect_err("illegal in transfer mode");
    assert!(matches!(err, SpmError::AmbiguousSequence));
    assert!(err.closes_connection());
}

#[tokio::test]
async fn test_enforcement_branches() {
    // Enforcement on: ordinary subjects cannot administrate.
    {
        let mut rig = rig(true).await;
        let mut crypto = rig.login("alice", "secret1234").await;
        let err = rig
            .feed(
                &Message::MakeSubject {
                    subject: "eve".to_string(),
                    stype: "user".to_string(),
                    password: "longenough1".to_string(),
                },
                Some(&mut crypto),
            )
            .await
            .expect_err("denied");
        assert_eq!(err.wire_text(), "Permission denied");
        assert!(!err.closes_connection());
        assert!(rig.store.db.get_subject("eve").expect("query").is_none());
    }

    // Enforcement off restores the record-only behavior.
    let mut rig = rig(false).await;
    let mut crypto = rig.login("alice", "secret1234").await;
    rig.roundtrip_okay(
        &Message::MakeSubject {
            subject: "eve".to_string(),
            stype: "user".to_string(),
            password: "longenough1".to_string(),
        },
        &mut crypto,
    )
    .await;
    assert!(rig.store.db.get_subject("eve").expect("query").is_some());
}
