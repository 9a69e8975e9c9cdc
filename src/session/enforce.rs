// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Policy enforcement.
//!
//! The database records state; these checks decide whether the session's
//! subject may change it. `super` subjects bypass everything. Ordinary
//! subjects prove themselves through the rights table: `T/g` to grant,
//! `T/t` to take, `T/r` to read an object, `T/w` to write under a
//! directory, and a link + matching type filter to transfer a ticket.
//! The whole layer is switchable off in the config, which restores the
//! record-only behavior of the database contract.

use crate::{
    errors::SpmError,
    store::{SubjectRec, policy::PolicyDb},
    tickets::{Right, Ticket},
};

fn denied() -> SpmError {
    SpmError::Refused("Permission denied".to_string())
}

/// Subject management, links and filters are operator territory.
pub fn require_super(actor: &SubjectRec) -> Result<(), SpmError> {
    if actor.is_super { Ok(()) } else { Err(denied()) }
}

fn holds(
    db: &PolicyDb,
    actor: &SubjectRec,
    right: Right,
    target: &str,
    is_object: bool,
) -> Result<bool, SpmError> {
    let ticket = Ticket::new(right).to_string();
    Ok(db.get_right(&actor.name, &ticket, target, is_object)?.is_some())
}

pub fn check_give(
    db: &PolicyDb,
    actor: &SubjectRec,
    target: &str,
    is_object: bool,
) -> Result<(), SpmError> {
    if actor.is_super || holds(db, actor, Right::Grant, target, is_object)? {
        Ok(())
    } else {
        Err(denied())
    }
}

pub fn check_take(
    db: &PolicyDb,
    actor: &SubjectRec,
    target: &str,
    is_object: bool,
) -> Result<(), SpmError> {
    if actor.is_super || holds(db, actor, Right::Take, target, is_object)? {
        Ok(())
    } else {
        Err(denied())
    }
}

pub fn check_read(db: &PolicyDb, actor: &SubjectRec, path: &str) -> Result<(), SpmError> {
    if actor.is_super || holds(db, actor, Right::Read, path, true)? {
        Ok(())
    } else {
        Err(denied())
    }
}

/// Writes (push, mkdir, delete) require `T/w` over the parent directory.
pub fn check_write(
    db: &PolicyDb,
    actor: &SubjectRec,
    parent: &str,
) -> Result<(), SpmError> {
    if actor.is_super || holds(db, actor, Right::Write, parent, true)? {
        Ok(())
    } else {
        Err(denied())
    }
}

/// A transfer needs the donor at the wire, a link donor -> recipient, and a
/// filter permitting the ticket between the two subject types.
pub fn check_xfer(
    db: &PolicyDb,
    actor: &SubjectRec,
    from: &SubjectRec,
    to: &SubjectRec,
    ticket: Ticket,
) -> Result<(), SpmError> {
    if actor.is_super {
        return Ok(());
    }
    if actor.name != from.name {
        return Err(denied());
    }
    if db.get_link(&from.name, &to.name)?.is_none() {
        return Err(denied());
    }
    if db
        .get_filter(&from.stype, &to.stype, &ticket.to_string())?
        .is_none()
    {
        return Err(denied());
    }
    Ok(())
}
