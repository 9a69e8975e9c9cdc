// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const USAGE: &str = "usage: spmd <bind-addr> <port> [config.yaml]";

/// Arguments the daemon takes on the command line. Everything else comes
/// from the optional YAML config.
#[derive(Debug, Clone)]
pub struct Cli {
    pub bind: String,
    pub port: u16,
    pub config: Option<PathBuf>,
}

pub fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli> {
    let bind = args.next().context(USAGE)?;
    let port = args
        .next()
        .context(USAGE)?
        .parse::<u16>()
        .context("port must be a number in 0..65536")?;
    let config = args.next().map(PathBuf::from);
    Ok(Cli { bind, port, config })
}

pub fn resolve_config_path(rel: &Path) -> Result<PathBuf> {
    let abs = if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(rel)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
