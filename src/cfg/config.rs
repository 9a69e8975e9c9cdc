// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Runtime configuration of the daemon. Every field has a default so that
/// `spmd <bind> <port>` works with no config file at all; a YAML file can
/// override any section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Listener, storage locations and policy enforcement.
    pub server: ServerConfig,
    /// Authentication tuning knobs.
    pub auth: AuthTuning,
    /// Optional path to the logger YAML; stdout defaults apply when unset.
    pub logger_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to; overridden by argv.
    pub bind: String,
    /// Port the listener binds to; overridden by argv.
    pub port: u16,
    /// Real directory backing the virtual object root.
    pub root_dir: PathBuf,
    /// SQLite file holding the policy tables.
    pub db_path: PathBuf,
    /// Gate administrative operations on rights, links and filters. With
    /// this off the daemon records policy state without consulting it.
    pub enforce_rights: bool,
    /// Super subject injected when the subjects table is empty.
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthTuning {
    /// Fixed part of the anti-timing delay answered to every
    /// `AUTH_SUBJECT`.
    pub login_delay_ms: u64,
    /// Upper bound of the random spread added to the fixed delay.
    pub login_jitter_ms: u64,
    /// Passwords at or below this length are refused.
    pub min_password_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub subject: String,
    pub stype: String,
    pub password: String,
    pub is_super: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthTuning::default(),
            logger_config: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5154,
            root_dir: PathBuf::from("./fileroot"),
            db_path: PathBuf::from("./sys.db"),
            enforce_rights: true,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for AuthTuning {
    fn default() -> Self {
        Self {
            login_delay_ms: 3000,
            login_jitter_ms: 1000,
            min_password_len: 8,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            subject: "admin".to_string(),
            stype: "main".to_string(),
            password: "password".to_string(),
            is_super: true,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {path:?}"))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config {path:?}"))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
