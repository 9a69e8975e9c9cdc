// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The policy database.
//!
//! Five tables: subjects, links, filters, rights, objects. Tickets are
//! stored in their `T/<r>` string form. Mutations run inside rusqlite
//! transactions; the cascades (subject deletion, ticket transfer, object
//! tree deletion) commit or roll back as a unit.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    store::{FilterRec, LinkRec, ObjectRec, RightRec, StoreError, SubjectRec},
    utils::parent_dir,
};

const SCHEMA: &[&str] = &[
    "create table if not exists subjects(subject text primary key, password text not null, \
     type text not null, super integer not null)",
    "create table if not exists links(subject1 text not null, subject2 text not null, \
     primary key (subject1, subject2))",
    "create table if not exists filters(type1 text not null, type2 text not null, \
     ticket text not null, primary key (type1, type2, ticket))",
    "create table if not exists rights(subject text not null, ticket text not null, \
     target text not null, isobject integer not null, \
     primary key (subject, ticket, target, isobject))",
    "create table if not exists objects(localpath text primary key, dir integer not null)",
];

#[derive(Debug)]
pub struct PolicyDb {
    conn: Mutex<Connection>,
}

impl PolicyDb {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        let tx = conn.transaction()?;
        for stmt in SCHEMA {
            tx.execute(stmt, [])?;
        }
        tx.commit()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Constraint("database handle poisoned".to_string()))
    }

    // -------- subjects --------

    pub fn insert_subject(
        &self,
        name: &str,
        secret_hex: &str,
        stype: &str,
        is_super: bool,
    ) -> Result<(), StoreError> {
        if name.is_empty() || secret_hex.is_empty() || stype.is_empty() {
            return Err(StoreError::Constraint(
                "Name, password, and type are required".to_string(),
            ));
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let exists: Option<String> = tx
            .query_row(
                "select subject from subjects where subject=?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::Constraint(
                "The subject already exists".to_string(),
            ));
        }
        tx.execute(
            "insert into subjects values(?1, ?2, ?3, ?4)",
            params![name, secret_hex, stype, is_super],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_subject(&self, name: &str) -> Result<Option<SubjectRec>, StoreError> {
        if name.is_empty() {
            return Err(StoreError::Constraint(
                "Cannot fetch subject without a name".to_string(),
            ));
        }
        let conn = self.conn()?;
        let rec = conn
            .query_row(
                "select subject, password, type, super from subjects where subject=?1",
                params![name],
                |row| {
                    Ok(SubjectRec {
                        name: row.get(0)?,
                        secret_hex: row.get(1)?,
                        stype: row.get(2)?,
                        is_super: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    pub fn subject_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("select subject from subjects order by subject")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Drop a subject together with its links (either side) and rights.
    pub fn delete_subject(&self, name: &str) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::Constraint(
                "Cannot delete subject without a name".to_string(),
            ));
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("delete from subjects where subject=?1", params![name])?;
        tx.execute(
            "delete from links where subject1=?1 or subject2=?1",
            params![name],
        )?;
        tx.execute("delete from rights where subject=?1", params![name])?;
        tx.commit()?;
        Ok(())
    }

    // -------- links --------

    pub fn insert_link(&self, subject1: &str, subject2: &str) -> Result<(), StoreError> {
        if subject1.is_empty() || subject2.is_empty() {
            return Err(StoreError::Constraint("Subject cannot be empty".to_string()));
        }
        if self.get_subject(subject1)?.is_none() || self.get_subject(subject2)?.is_none() {
            return Err(StoreError::Constraint(
                "One of the subjects does not exist in the subjects table".to_string(),
            ));
        }
        let conn = self.conn()?;
        // Duplicate links are a no-op.
        conn.execute(
            "insert or ignore into links values(?1, ?2)",
            params![subject1, subject2],
        )?;
        Ok(())
    }

    pub fn get_link(
        &self,
        subject1: &str,
        subject2: &str,
    ) -> Result<Option<LinkRec>, StoreError> {
        if subject1.is_empty() || subject2.is_empty() {
            return Err(StoreError::Constraint("Subject cannot be empty".to_string()));
        }
        let conn = self.conn()?;
        let rec = conn
            .query_row(
                "select subject1, subject2 from links where subject1=?1 and subject2=?2",
                params![subject1, subject2],
                |row| {
                    Ok(LinkRec {
                        subject1: row.get(0)?,
                        subject2: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    pub fn delete_link(&self, subject1: &str, subject2: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "delete from links where subject1=?1 and subject2=?2",
            params![subject1, subject2],
        )?;
        Ok(())
    }

    /// Remove every link mentioning the subject in either position.
    pub fn clear_links(&self, name: &str) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::Constraint(
                "Cannot clear subject links without a name".to_string(),
            ));
        }
        let conn = self.conn()?;
        conn.execute(
            "delete from links where subject1=?1 or subject2=?1",
            params![name],
        )?;
        Ok(())
    }

    /// All links mentioning the subject in either position.
    pub fn links_of(&self, name: &str) -> Result<Vec<LinkRec>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "select subject1, subject2 from links where subject1=?1 or subject2=?1",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok(LinkRec {
                subject1: row.get(0)?,
                subject2: row.get(1)?,
            })
        })?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    // -------- filters --------

    pub fn insert_filter(
        &self,
        type1: &str,
        type2: &str,
        ticket: &str,
    ) -> Result<(), StoreError> {
        if type1.is_empty() || type2.is_empty() {
            return Err(StoreError::Constraint("Types cannot be empty".to_string()));
        }
        if self.get_filter(type1, type2, ticket)?.is_some() {
            return Err(StoreError::Constraint("Filter already exists".to_string()));
        }
        let conn = self.conn()?;
        conn.execute(
            "insert into filters values(?1, ?2, ?3)",
            params![type1, type2, ticket],
        )?;
        Ok(())
    }

    pub fn get_filter(
        &self,
        type1: &str,
        type2: &str,
        ticket: &str,
    ) -> Result<Option<FilterRec>, StoreError> {
        if type1.is_empty() || type2.is_empty() {
            return Err(StoreError::Constraint("Types cannot be empty".to_string()));
        }
        let conn = self.conn()?;
        let rec = conn
            .query_row(
                "select type1, type2, ticket from filters where type1=?1 and type2=?2 \
                 and ticket=?3",
                params![type1, type2, ticket],
                |row| {
                    Ok(FilterRec {
                        type1: row.get(0)?,
                        type2: row.get(1)?,
                        ticket: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    pub fn delete_filter(
        &self,
        type1: &str,
        type2: &str,
        ticket: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "delete from filters where type1=?1 and type2=?2 and ticket=?3",
            params![type1, type2, ticket],
        )?;
        Ok(())
    }

    // -------- rights --------

    pub fn insert_right(
        &self,
        subject: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<(), StoreError> {
        if subject.is_empty() || target.is_empty() {
            return Err(StoreError::Constraint(
                "Subject and target are required".to_string(),
            ));
        }
        if self.get_subject(subject)?.is_none() {
            return Err(StoreError::Constraint("Subject must exist".to_string()));
        }
        if is_object {
            // The virtual root is always a valid target even though it has
            // no row of its own.
            if target != "/" && self.get_object(target)?.is_none() {
                return Err(StoreError::Constraint(
                    "Target object does not exist in database".to_string(),
                ));
            }
        } else if self.get_subject(target)?.is_none() {
            return Err(StoreError::Constraint(
                "Target subject does not exist in the database".to_string(),
            ));
        }
        let conn = self.conn()?;
        // Re-granting an identical right is a no-op.
        conn.execute(
            "insert or ignore into rights values(?1, ?2, ?3, ?4)",
            params![subject, ticket, target, is_object],
        )?;
        Ok(())
    }

    pub fn get_right(
        &self,
        subject: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<Option<RightRec>, StoreError> {
        let conn = self.conn()?;
        let rec = conn
            .query_row(
                "select subject, ticket, target, isobject from rights where subject=?1 \
                 and ticket=?2 and target=?3 and isobject=?4",
                params![subject, ticket, target, is_object],
                |row| {
                    Ok(RightRec {
                        subject: row.get(0)?,
                        ticket: row.get(1)?,
                        target: row.get(2)?,
                        is_object: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    pub fn delete_right(
        &self,
        subject: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "delete from rights where subject=?1 and ticket=?2 and target=?3 \
             and isobject=?4",
            params![subject, ticket, target, is_object],
        )?;
        Ok(())
    }

    /// Move a right from `from` to `to` atomically: the insert and the
    /// delete commit together or not at all.
    pub fn transfer_right(
        &self,
        from: &str,
        to: &str,
        ticket: &str,
        target: &str,
        is_object: bool,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "insert or ignore into rights values(?1, ?2, ?3, ?4)",
            params![to, ticket, target, is_object],
        )?;
        tx.execute(
            "delete from rights where subject=?1 and ticket=?2 and target=?3 \
             and isobject=?4",
            params![from, ticket, target, is_object],
        )?;
        tx.commit()?;
        Ok(())
    }

    // -------- objects --------

    /// Declare an object row. The parent must already be a directory row
    /// (or the virtual root).
    pub fn insert_object(&self, localpath: &str, is_dir: bool) -> Result<(), StoreError> {
        Self::require_absolute(localpath)?;
        let parent = parent_dir(localpath);
        if parent != "/" {
            match self.get_object(parent)? {
                Some(rec) if rec.is_dir => {},
                _ => {
                    return Err(StoreError::Constraint(
                        "A parent directory is missing".to_string(),
                    ));
                },
            }
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let exists: Option<String> = tx
            .query_row(
                "select localpath from objects where localpath=?1",
                params![localpath],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::Constraint(
                "The object already exists in the database".to_string(),
            ));
        }
        tx.execute(
            "insert into objects values(?1, ?2)",
            params![localpath, is_dir],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_object(&self, localpath: &str) -> Result<Option<ObjectRec>, StoreError> {
        Self::require_absolute(localpath)?;
        let conn = self.conn()?;
        let rec = conn
            .query_row(
                "select localpath, dir from objects where localpath=?1",
                params![localpath],
                |row| {
                    Ok(ObjectRec {
                        localpath: row.get(0)?,
                        is_dir: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    /// Objects exactly one level below `cwd`, ordered by path.
    pub fn children(&self, cwd: &str) -> Result<Vec<String>, StoreError> {
        Self::require_absolute(cwd)?;
        let escaped = cwd
            .replace('\\', "\\\\")
            .replace('_', "\\_")
            .replace('%', "\\%");
        let pattern = if cwd == "/" {
            "/%".to_string()
        } else {
            format!("{escaped}/%")
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "select localpath from objects where localpath like ?1 escape '\\' \
             order by localpath",
        )?;
        let rows = stmt.query_map(params![pattern], |row| row.get::<_, String>(0))?;
        let mut paths = Vec::new();
        for row in rows {
            let path = row?;
            if parent_dir(&path) == cwd {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Drop an object row and every row beneath it.
    pub fn delete_object_tree(&self, localpath: &str) -> Result<(), StoreError> {
        Self::require_absolute(localpath)?;
        let escaped = localpath
            .replace('\\', "\\\\")
            .replace('_', "\\_")
            .replace('%', "\\%");
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "delete from objects where localpath=?1",
            params![localpath],
        )?;
        tx.execute(
            "delete from objects where localpath like ?1 escape '\\'",
            params![format!("{escaped}/%")],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn require_absolute(localpath: &str) -> Result<(), StoreError> {
        if localpath.is_empty() || !localpath.starts_with('/') {
            return Err(StoreError::Constraint("The path is invalid".to_string()));
        }
        Ok(())
    }
}
