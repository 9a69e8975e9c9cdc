// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::ChronoLocal, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Deserialize, Clone)]
struct LoggerConfig {
    logger: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
enum Output {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
enum RotationFreq {
    Minutely,
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Deserialize, Clone)]
struct LogFileConfig {
    path: String,
    #[serde(default)]
    rotation_frequency: Option<RotationFreq>,
}

#[derive(Debug, Deserialize, Clone)]
struct LogConfig {
    level: String,
    output: Output,
    #[serde(default)]
    json: bool,
    #[serde(default)]
    is_show_line: bool,
    #[serde(default)]
    is_show_module_path: bool,
    #[serde(default = "default_show_target")]
    is_show_target: bool,
    #[serde(default)]
    file: Option<LogFileConfig>,
}

fn default_show_target() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: Output::Stdout,
            json: false,
            is_show_line: false,
            is_show_module_path: false,
            is_show_target: true,
            file: None,
        }
    }
}

/// Install the global subscriber from an optional YAML config; plain
/// stdout at `info` when no config is given. The returned guard must stay
/// alive for file output to keep flushing. A second call is a no-op.
pub fn init_logger(path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let cfg = match path {
        Some(p) => {
            let raw = fs::read_to_string(p)
                .with_context(|| format!("failed to read logger config {p:?}"))?;
            serde_yaml::from_str::<LoggerConfig>(&raw)
                .with_context(|| format!("failed to parse logger config {p:?}"))?
                .logger
        },
        None => LogConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .context("invalid log level")?;

    let (writer, guard): (BoxMakeWriter, Option<WorkerGuard>) = match cfg.output {
        Output::Stdout => (BoxMakeWriter::new(std::io::stdout), None),
        Output::Stderr => (BoxMakeWriter::new(std::io::stderr), None),
        Output::File => {
            let file_cfg = cfg
                .file
                .clone()
                .context("output=file requires a file section")?;
            let full = Path::new(&file_cfg.path);
            let dir = full.parent().unwrap_or_else(|| Path::new("."));
            let name = full
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("spmd.log");
            let rotation = match file_cfg.rotation_frequency.unwrap_or(RotationFreq::Never)
            {
                RotationFreq::Minutely => Rotation::MINUTELY,
                RotationFreq::Hourly => Rotation::HOURLY,
                RotationFreq::Daily => Rotation::DAILY,
                RotationFreq::Never => Rotation::NEVER,
            };
            let appender = RollingFileAppender::new(rotation, dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        },
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_timer(ChronoLocal::new("%Y-%m-%dT%H:%M:%S%.3f".to_string()))
        .with_line_number(cfg.is_show_line)
        .with_file(cfg.is_show_module_path)
        .with_target(cfg.is_show_target);

    let registry = tracing_subscriber::registry().with(filter);
    if cfg.json {
        let _ = registry.with(layer.json()).try_init();
    } else {
        let _ = registry.with(layer).try_init();
    }
    Ok(guard)
}
