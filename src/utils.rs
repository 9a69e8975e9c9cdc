// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Helpers for the virtual object namespace.
//!
//! Every object lives under a virtual root `/`; the daemon maps a virtual
//! path onto the real filesystem only at the object-store boundary. Paths
//! on the wire may be relative to the session's working directory, so the
//! session layer normalises them here before touching the store.

/// Resolve `local` against the working directory `cwd` and normalise the
/// result: collapse duplicate separators, drop `.` segments, resolve `..`
/// without ever escaping the virtual root.
///
/// The returned path is always absolute and never ends with a separator
/// (except for the root itself).
pub fn normalize_path(cwd: &str, local: &str) -> String {
    let base = if local.starts_with('/') { "" } else { cwd };
    let mut segments: Vec<&str> = Vec::new();
    for part in base.split('/').chain(local.split('/')) {
        match part {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent directory of a normalised virtual path. The parent of `/` is `/`.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}
