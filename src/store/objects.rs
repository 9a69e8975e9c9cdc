// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The object root.
//!
//! A trusted local directory the daemon owns. Virtual paths are already
//! normalised when they arrive here (no `..`, always absolute), so the
//! mapping is a plain join under the root and can never escape it.

use std::{fs, path::{Path, PathBuf}};

use tokio::fs::File;

#[derive(Debug)]
pub struct ObjectRoot {
    root: PathBuf,
}

impl ObjectRoot {
    /// Open the root directory, creating it when missing.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        if !root.exists() {
            fs::create_dir_all(root)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a normalised virtual path onto the real filesystem.
    pub fn resolve(&self, localpath: &str) -> PathBuf {
        self.root.join(localpath.trim_start_matches('/'))
    }

    pub fn exists(&self, localpath: &str) -> bool {
        self.resolve(localpath).exists()
    }

    pub fn is_file(&self, localpath: &str) -> bool {
        self.resolve(localpath).is_file()
    }

    pub fn is_dir(&self, localpath: &str) -> bool {
        localpath == "/" || self.resolve(localpath).is_dir()
    }

    pub async fn open_read(&self, localpath: &str) -> std::io::Result<File> {
        File::open(self.resolve(localpath)).await
    }

    /// Open for writing, truncating any previous content.
    pub async fn open_write(&self, localpath: &str) -> std::io::Result<File> {
        File::create(self.resolve(localpath)).await
    }

    pub fn make_dir(&self, localpath: &str) -> std::io::Result<()> {
        fs::create_dir(self.resolve(localpath))
    }

    /// Remove a file or a whole directory tree.
    pub fn remove(&self, localpath: &str) -> std::io::Result<()> {
        let real = self.resolve(localpath);
        if real.is_dir() {
            fs::remove_dir_all(real)
        } else {
            fs::remove_file(real)
        }
    }
}
