// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Persistent state: the policy database and the object root.
//!
//! The database enforces consistency and uniform storage, not the security
//! model; policy enforcement is the session layer's responsibility. The
//! `Store` facade combines the two engines for the operations that must
//! touch a table row and the filesystem together.

/// Root-anchored object tree on the local filesystem.
pub mod objects;
/// The five-table policy database (rusqlite).
pub mod policy;

use std::path::Path;

use thiserror::Error;

use crate::store::{objects::ObjectRoot, policy::PolicyDb};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Constraint violation or failed precondition, carrying the
    /// operator-facing detail text.
    #[error("{0}")]
    Constraint(String),

    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("filesystem failure: {0}")]
    Io(#[from] std::io::Error),
}

/// A subject row. `secret_hex` is the hex-encoded PBKDF2 digest of the
/// password; the cleartext never reaches disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRec {
    pub name: String,
    pub secret_hex: String,
    pub stype: String,
    pub is_super: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRec {
    pub subject1: String,
    pub subject2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRec {
    pub type1: String,
    pub type2: String,
    pub ticket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightRec {
    pub subject: String,
    pub ticket: String,
    pub target: String,
    pub is_object: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRec {
    pub localpath: String,
    pub is_dir: bool,
}

/// The shared handle every session receives: policy rows plus the file
/// tree they describe.
#[derive(Debug)]
pub struct Store {
    pub db: PolicyDb,
    pub objects: ObjectRoot,
}

impl Store {
    pub fn open(db_path: &Path, root: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: PolicyDb::open(db_path)?,
            objects: ObjectRoot::new(root)?,
        })
    }

    /// In-memory database plus a throwaway root, for tests.
    pub fn open_ephemeral(root: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: PolicyDb::open_in_memory()?,
            objects: ObjectRoot::new(root)?,
        })
    }

    /// Declare a new object: table row first (which enforces the
    /// parent-directory invariant), then the directory itself for `is_dir`
    /// entries. A failed mkdir rolls the row back.
    pub fn insert_object(&self, localpath: &str, is_dir: bool) -> Result<(), StoreError> {
        self.db.insert_object(localpath, is_dir)?;
        if is_dir {
            if let Err(e) = self.objects.make_dir(localpath) {
                let _ = self.db.delete_object_tree(localpath);
                return Err(StoreError::Io(e));
            }
        }
        Ok(())
    }

    /// Remove an object: the file or directory tree on disk, then the row
    /// and every descendant row.
    pub fn delete_path(&self, localpath: &str) -> Result<(), StoreError> {
        if self.db.get_object(localpath)?.is_none() {
            return Err(StoreError::Constraint(
                "The path is not in the database".to_string(),
            ));
        }
        self.objects.remove(localpath)?;
        self.db.delete_object_tree(localpath)?;
        Ok(())
    }
}
