//! Glob expansion and tree copying under the destination root.

use std::{
    fs,
    path::{Path, PathBuf},
};

use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::error::Error;

/// Glob used when a translation has no `src`.
pub const DEFAULT_SRC_GLOB: &str = "**/*";

fn has_glob_meta(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
}

/// Directory part of `pattern` before the first glob meta-character.
fn static_prefix_dir(pattern: &str) -> &str {
    let idx = pattern
        .bytes()
        .position(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
        .unwrap_or(pattern.len());
    match pattern[..idx].rfind('/') {
        Some(slash) => &pattern[..slash],
        None => "",
    }
}

fn build_matcher(pattern: &str) -> Result<GlobMatcher, Error> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| Error::InvalidGlob {
            pattern: pattern.to_string(),
            source,
        })?;
    Ok(glob.compile_matcher())
}

/// Expands `pattern` relative to `root` into the files it matches, sorted.
///
/// Hidden entries are not visited and ignore files are not consulted, so the result does not
/// depend on whether `root` sits inside a repository.
pub fn expand_glob(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let pattern = pattern.trim_start_matches("./");
    if !has_glob_meta(pattern) {
        let path = root.join(pattern);
        return Ok(if path.is_file() { vec![path] } else { Vec::new() });
    }

    let matcher = build_matcher(pattern)?;
    let walk_root = root.join(static_prefix_dir(pattern));
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let walker = WalkBuilder::new(&walk_root)
        .standard_filters(false)
        .hidden(true)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if matcher.is_match(relative) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Copies every file under `src` into `dest`, creating directories as needed.
/// Existing files in `dest` are overwritten. A `dest` inside `src` is not copied into itself.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize, Error> {
    fs::create_dir_all(dest).map_err(|e| Error::file_io(dest, e))?;
    let src = src.canonicalize().map_err(|e| Error::file_io(src, e))?;
    let dest = dest.canonicalize().map_err(|e| Error::file_io(dest, e))?;
    let src = src.as_path();
    let dest = dest.as_path();

    let excluded = dest.to_path_buf();
    let walker = WalkBuilder::new(src)
        .standard_filters(false)
        .filter_entry(move |entry| !entry.path().starts_with(&excluded))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);
        match entry.file_type() {
            Some(t) if t.is_dir() => {
                fs::create_dir_all(&target).map_err(|e| Error::file_io(&target, e))?
            }
            Some(t) if t.is_file() => files.push((entry.into_path(), target)),
            _ => {}
        }
    }

    files
        .par_iter()
        .try_for_each(|(from, to)| fs::copy(from, to).map(|_| ()).map_err(|e| Error::file_io(to, e)))?;
    Ok(files.len())
}
