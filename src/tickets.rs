// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Rights tickets.
//!
//! A ticket is a single capability letter wrapped in the fixed three
//! character wire form `T/<letter>`. The letters are `t` (take), `g`
//! (grant), `r` (read) and `w` (write). Tickets travel on the wire and are
//! stored in the policy database in the same string form.

use core::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Returned when a ticket string is not exactly `T/` plus one right letter.
#[derive(Debug, Error)]
#[error("bad ticket format: {0:?}")]
pub struct BadTicketError(pub String);

/// The four single-letter rights a ticket can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    Take,
    Grant,
    Read,
    Write,
}

impl Right {
    pub fn letter(self) -> char {
        match self {
            Right::Take => 't',
            Right::Grant => 'g',
            Right::Read => 'r',
            Right::Write => 'w',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        Some(match c {
            't' => Right::Take,
            'g' => Right::Grant,
            'r' => Right::Read,
            'w' => Right::Write,
            _ => return None,
        })
    }
}

/// A parsed rights ticket. `Display` renders the canonical wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub right: Right,
}

impl Ticket {
    /// Exact length of the wire/database form.
    pub const WIRE_LEN: usize = 3;

    pub fn new(right: Right) -> Self {
        Self { right }
    }

    /// Parse the strict `T/<letter>` form. Anything else is malformed.
    pub fn parse(s: &str) -> Result<Self, BadTicketError> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next(), chars.next()) {
            (Some('T'), Some('/'), Some(letter), None) => Right::from_letter(letter)
                .map(Ticket::new)
                .ok_or_else(|| BadTicketError(s.to_string())),
            _ => Err(BadTicketError(s.to_string())),
        }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T/{}", self.right.letter())
    }
}

impl FromStr for Ticket {
    type Err = BadTicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticket::parse(s)
    }
}
