// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File copying and sizing helpers.

use ignore::{DirEntry, WalkBuilder};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Copy file or directory tree from source to destination.
///
/// Directories are merged into the destination, overwriting files that
/// already exist. Symbolic links are followed. Git metadata and Finder
/// droppings are never copied. Files whose source already resolves to their
/// destination, e.g., a config symlinked out of the dotfiles repository, are
/// left alone. Returns number of files copied.
///
/// # Errors
///
/// - Return [`io::Error`] if any file cannot be read or written.
pub fn copy_path(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<usize> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if src.is_file() {
        return copy_file(src, dst).map(usize::from);
    }

    let mut copied = 0;
    for entry in walk(src) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        copied += usize::from(copy_file(entry.path(), dst.join(relative))?);
    }

    Ok(copied)
}

/// Total size in bytes of file or directory tree.
///
/// Unreadable entries are silently left out of the total.
pub fn disk_usage(path: impl AsRef<Path>) -> u64 {
    walk(path.as_ref())
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

/// Count regular files in file or directory tree.
pub fn file_count(path: impl AsRef<Path>) -> usize {
    walk(path.as_ref())
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
        .count()
}

/// Format byte count for humans, e.g., `1.5 MiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

fn walk(path: &Path) -> ignore::Walk {
    WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(true)
        .filter_entry(|entry: &DirEntry| {
            let name = entry.file_name();
            name != ".git" && name != ".DS_Store"
        })
        .build()
}

// INVARIANT: Never copy a file onto itself, the destination is truncated
// before the source is read.
fn copy_file(src: &Path, dst: impl Into<PathBuf>) -> io::Result<bool> {
    let dst = dst.into();
    if is_same_file(src, &dst) {
        debug!("skip {:?}, already in place", dst.display());
        return Ok(false);
    }

    if let Some(parent) = dst.parent() {
        mkdirp::mkdirp(parent)?;
    }

    fs::copy(src, &dst)?;
    Ok(true)
}

fn is_same_file(src: &Path, dst: &Path) -> bool {
    match (fs::canonicalize(src), fs::canonicalize(dst)) {
        (Ok(src), Ok(dst)) => src == dst,
        _ => false,
    }
}
