//! Recursive file collection for a run.

use std::path::{Path, PathBuf};

use jpc_core::JpcResult;
use tracing::{debug, warn};

/// Which files a walk includes.
#[derive(Debug, Clone, Default)]
pub struct CollectConfig {
    /// Glob patterns matched against file and directory names
    pub exclude_patterns: Vec<String>,
    /// Directory subtree never entered (the output tree when nested in the input)
    pub skip_dir: Option<PathBuf>,
}

/// Collect all regular files under `root` recursively, sorted.
///
/// An unreadable `root` is an error; unreadable subdirectories are logged and
/// skipped. Symlinks are not followed.
pub fn collect_files(root: &Path, config: &CollectConfig) -> JpcResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let exclude_matchers: Vec<glob::Pattern> = config
        .exclude_patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, "ignoring invalid exclude pattern: {e}");
                None
            }
        })
        .collect();
    let skip_dir = config
        .skip_dir
        .as_ref()
        .and_then(|d| std::fs::canonicalize(d).ok());

    collect_files_inner(root, &mut files, &exclude_matchers, skip_dir.as_deref())?;
    files.sort(); // deterministic order
    Ok(files)
}

fn collect_files_inner(
    dir: &Path,
    out: &mut Vec<PathBuf>,
    excludes: &[glob::Pattern],
    skip_dir: Option<&Path>,
) -> JpcResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if excludes.iter().any(|p| p.matches(&name)) {
            debug!(path = %path.display(), "excluded");
            continue;
        }

        if file_type.is_dir() {
            if let Some(skip) = skip_dir {
                if std::fs::canonicalize(&path).is_ok_and(|c| c == skip) {
                    debug!(path = %path.display(), "skipping output directory");
                    continue;
                }
            }
            if let Err(e) = collect_files_inner(&path, out, excludes, skip_dir) {
                warn!(path = %path.display(), "skipping unreadable directory: {e}");
            }
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
