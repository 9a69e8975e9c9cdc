// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use spmd_rs::models::{
    DATA_LEN, FRAME_LEN, PROTOCOL_VERSION, TAG_OFFSET, frame, message::Message,
};

use crate::unit_tests::crypto_pair;

fn sample_public_messages() -> Vec<Message> {
    vec![
        Message::HelloServer {
            version: PROTOCOL_VERSION,
        },
        Message::HelloClient {
            version: PROTOCOL_VERSION,
        },
        Message::Die,
        Message::ErrorServer {
            msg: "Version mismatch.".to_string(),
        },
        Message::AuthSubject {
            subject: "admin".to_string(),
            salt: [0u8; 32],
        },
        Message::RejectAuth,
    ]
}

fn sample_private_messages() -> Vec<Message> {
    vec![
        Message::Die,
        Message::Okay,
        Message::GetCd,
        Message::ListSubjectClient,
        Message::ListObjectClient,
        Message::PullFile {
            name: "/a.bin".to_string(),
        },
        Message::PushFile {
            name: "b.bin".to_string(),
        },
        Message::XferFile {
            data: Bytes::from(vec![0x5au8; 1000]),
        },
        Message::ErrorServer {
            msg: "DatabaseError: boom".to_string(),
        },
        Message::AuthSubject {
            subject: "admin".to_string(),
            salt: [9u8; 32],
        },
        Message::ConfirmAuth {
            subject: "admin".to_string(),
        },
        Message::ListSubjectServer {
            subjects: vec!["admin".to_string(), "alice".to_string()],
        },
        Message::ListObjectServer {
            paths: vec!["/a.bin".to_string()],
        },
        Message::GiveTicketSubject {
            subject: "alice".to_string(),
            ticket: "T/r".to_string(),
            target: "/a.bin".to_string(),
            is_object: true,
        },
        Message::TakeTicketSubject {
            subject: "alice".to_string(),
            ticket: "T/w".to_string(),
            target: "bob".to_string(),
            is_object: false,
        },
        Message::XferTicket {
            from: "alice".to_string(),
            to: "bob".to_string(),
            ticket: "T/g".to_string(),
            target: "/a.bin".to_string(),
            is_object: true,
        },
        Message::MakeDirectory {
            dir: "/docs".to_string(),
        },
        Message::MakeSubject {
            subject: "alice".to_string(),
            stype: "user".to_string(),
            password: "secret1234".to_string(),
        },
        Message::Cd {
            path: "/docs".to_string(),
        },
        Message::MakeFilter {
            type1: "user".to_string(),
            type2: "user".to_string(),
            ticket: "T/g".to_string(),
        },
        Message::DeleteFilter {
            type1: "user".to_string(),
            type2: "user".to_string(),
            ticket: "T/g".to_string(),
        },
        Message::MakeLink {
            subject1: "alice".to_string(),
            subject2: "bob".to_string(),
        },
        Message::DeletePath {
            path: "/docs".to_string(),
        },
        Message::ClearLinks {
            subject: "alice".to_string(),
        },
        Message::DeleteSubject {
            subject: "alice".to_string(),
        },
    ]
}

#[test]
fn test_public_roundtrip() {
    for msg in sample_public_messages() {
        let raw = frame::build(&msg, None).expect("build public");
        assert_eq!(raw.len(), FRAME_LEN);
        // PUBLIC frames carry a zeroed MAC region.
        assert!(raw[TAG_OFFSET..].iter().all(|&b| b == 0));
        let parsed = frame::parse(&raw, None).expect("parse public");
        assert_eq!(parsed, msg);
    }
}

#[test]
fn test_private_roundtrip_in_lockstep() {
    let (mut sender, mut receiver) = crypto_pair();
    for msg in sample_private_messages() {
        let raw = frame::build(&msg, Some(&mut sender)).expect("build private");
        assert_eq!(raw.len(), FRAME_LEN);
        let parsed = frame::parse(&raw, Some(&mut receiver)).expect("parse private");
        assert_eq!(parsed, msg);
    }
}

#[test]
fn test_private_frame_rejected_without_key() {
    let (mut sender, _) = crypto_pair();
    let raw = frame::build(&Message::Okay, Some(&mut sender)).expect("build");
    assert!(frame::parse(&raw, None).is_err());
}

#[test]
fn test_public_frame_rejected_with_key() {
    let (_, mut receiver) = crypto_pair();
    let raw = frame::build(&Message::Die, None).expect("build");
    assert!(frame::parse(&raw, Some(&mut receiver)).is_err());
}

#[test]
fn test_mac_covers_every_protected_byte() {
    let (mut sender, mut receiver) = crypto_pair();
    let raw = frame::build(&Message::Okay, Some(&mut sender)).expect("build");
    // A failed verification must not advance the receiver keystream, so
    // the same receiver state serves every flipped copy and still opens
    // the pristine frame afterwards.
    for i in 1..TAG_OFFSET {
        let mut bad = raw;
        bad[i] ^= 0x01;
        assert!(
            frame::parse(&bad, Some(&mut receiver)).is_err(),
            "flip at offset {i} went unnoticed"
        );
    }
    let mut bad = raw;
    bad[0] ^= 0x01;
    assert!(frame::parse(&bad, Some(&mut receiver)).is_err(), "class flip");
    let mut bad = raw;
    bad[FRAME_LEN - 1] ^= 0x01;
    assert!(frame::parse(&bad, Some(&mut receiver)).is_err(), "tag flip");
    assert_eq!(
        frame::parse(&raw, Some(&mut receiver)).expect("pristine frame"),
        Message::Okay
    );
}

#[test]
fn test_unknown_class_and_type_rejected() {
    let mut raw = [0u8; FRAME_LEN];
    raw[0] = 2;
    assert!(frame::parse(&raw, None).is_err());

    let mut raw = [0u8; FRAME_LEN];
    raw[0] = 0;
    raw[1] = 0xee;
    assert!(frame::parse(&raw, None).is_err());
}

#[test]
fn test_disallowed_class_type_pairs() {
    // CONFIRM_AUTH never travels in cleartext.
    assert!(
        frame::build(
            &Message::ConfirmAuth {
                subject: "admin".to_string()
            },
            None
        )
        .is_err()
    );
    // The greeting never travels sealed.
    let (mut sender, _) = crypto_pair();
    assert!(
        frame::build(
            &Message::HelloClient {
                version: PROTOCOL_VERSION
            },
            Some(&mut sender)
        )
        .is_err()
    );
    // A crafted public frame with a private-only type byte is refused.
    let mut raw = [0u8; FRAME_LEN];
    raw[1] = 0x09; // CONFIRM_AUTH
    assert!(frame::parse(&raw, None).is_err());
}

#[test]
fn test_wrong_length_rejected() {
    assert!(frame::parse(&[0u8; FRAME_LEN - 1], None).is_err());
    assert!(frame::parse(&[0u8; FRAME_LEN + 1], None).is_err());
}

#[test]
fn test_transfer_chunk_bounds() {
    let (mut sender, mut receiver) = crypto_pair();
    let full = Message::XferFile {
        data: Bytes::from(vec![7u8; DATA_LEN]),
    };
    let raw = frame::build(&full, Some(&mut sender)).expect("full chunk");
    assert_eq!(frame::parse(&raw, Some(&mut receiver)).expect("parse"), full);

    let oversize = Message::XferFile {
        data: Bytes::from(vec![7u8; DATA_LEN + 1]),
    };
    assert!(frame::build(&oversize, Some(&mut sender)).is_err());
}
