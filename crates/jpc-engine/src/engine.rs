//! Run orchestration: one container per input file, one restored file per
//! container.
//!
//!   - `encrypt_file`: fresh carrier → relative path → append trailer
//!   - `decrypt_file`: extension filter → open → restore path → write
//!   - `encrypt_tree` / `decrypt_tree`: walk the input, process every file
//!     independently, aggregate a `RunReport`
//!
//! Files are processed sequentially unless `run.workers != 1`, in which case
//! a rayon pool shares the cipher and config read-only.

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use jpc_container::{append, open, write_carrier, PathCodec};
use jpc_core::{JpcConfig, JpcError, JpcResult};
use jpc_crypto::EnvelopeCipher;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::collect::{collect_files, CollectConfig};
use crate::report::RunReport;

/// Progress callback type (files_done, files_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Everything a run shares across files.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub cipher: &'a dyn EnvelopeCipher,
    pub config: &'a JpcConfig,
    pub paths: PathCodec,
}

impl<'a> RunContext<'a> {
    pub fn new(cipher: &'a dyn EnvelopeCipher, config: &'a JpcConfig) -> Self {
        Self {
            cipher,
            config,
            paths: PathCodec::from_config(&config.paths),
        }
    }
}

impl std::fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("scheme", &self.cipher.scheme())
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a carrier extension
    Extension,
    /// No end-of-image marker
    NotAContainer,
    /// A plain image with nothing appended
    NoPayload,
}

/// Result of processing a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Written {
        source: PathBuf,
        target: PathBuf,
        /// Plaintext bytes
        bytes: u64,
    },
    Skipped {
        path: PathBuf,
        reason: SkipReason,
    },
}

/// Name of the directory being encrypted, as embedded in every path.
///
/// Falls back to the canonical path for inputs like `.` that have no final
/// component of their own.
pub fn base_dir_name(input_root: &Path) -> JpcResult<(String, PathBuf)> {
    let root = match input_root.file_name() {
        Some(_) => input_root.to_path_buf(),
        None => std::fs::canonicalize(input_root)?,
    };
    let name = root
        .file_name()
        .ok_or_else(|| JpcError::Usage(format!("{} has no directory name", input_root.display())))?
        .to_str()
        .ok_or_else(|| {
            JpcError::Usage(format!("{} is not valid UTF-8", input_root.display()))
        })?
        .to_string();
    Ok((name, root))
}

/// Encrypt one file into a new container under `output_dir`.
pub fn encrypt_file(
    ctx: &RunContext<'_>,
    source: &Path,
    base_name: &str,
    output_dir: &Path,
) -> JpcResult<FileOutcome> {
    let plaintext = std::fs::read(source)?;

    let source_str = source
        .to_str()
        .ok_or_else(|| JpcError::Other(anyhow!("{} is not valid UTF-8", source.display())))?;
    let relative = ctx.paths.relative_path(source_str, base_name)?;

    let target = output_dir.join(format!(
        "{}.{}",
        uuid::Uuid::new_v4(),
        ctx.config.carrier.extension
    ));
    write_carrier(&target, &ctx.config.carrier)?;

    if let Err(e) = append(&target, &plaintext, &relative, ctx.cipher) {
        if let Err(rm) = std::fs::remove_file(&target) {
            warn!(path = %target.display(), "failed to remove partial container: {rm}");
        }
        return Err(e);
    }

    info!(
        source = %source.display(),
        container = %target.display(),
        bytes = plaintext.len(),
        "encrypted"
    );

    Ok(FileOutcome::Written {
        source: source.to_path_buf(),
        target,
        bytes: plaintext.len() as u64,
    })
}

/// Restore one container under `output_root`.
pub fn decrypt_file(
    ctx: &RunContext<'_>,
    candidate: &Path,
    output_root: &Path,
) -> JpcResult<FileOutcome> {
    let skipped = |reason| FileOutcome::Skipped {
        path: candidate.to_path_buf(),
        reason,
    };

    let wanted = &ctx.config.carrier.extension;
    let matches_ext = candidate
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
    if !matches_ext {
        debug!(path = %candidate.display(), "not a .{wanted} file, skipping");
        return Ok(skipped(SkipReason::Extension));
    }

    let data = std::fs::read(candidate)?;
    let recovered = match open(&data, ctx.cipher) {
        Ok(r) => r,
        Err(JpcError::NotAContainer) => return Ok(skipped(SkipReason::NotAContainer)),
        Err(JpcError::NoPayload) => {
            debug!(path = %candidate.display(), "no trailer, skipping");
            return Ok(skipped(SkipReason::NoPayload));
        }
        Err(e) => return Err(e),
    };

    let target = ctx
        .paths
        .restore_path(output_root, &recovered.relative_path)?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(JpcError::PathCollision(target.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(&recovered.payload)?;

    info!(
        container = %candidate.display(),
        target = %target.display(),
        bytes = recovered.payload.len(),
        "decrypted"
    );

    Ok(FileOutcome::Written {
        source: candidate.to_path_buf(),
        target,
        bytes: recovered.payload.len() as u64,
    })
}

/// Encrypt every file under `input_root` into containers in `output_dir`.
pub fn encrypt_tree(
    ctx: &RunContext<'_>,
    input_root: &Path,
    output_dir: &Path,
    progress: Option<&ProgressFn>,
) -> JpcResult<RunReport> {
    let (base_name, root) = prepare(input_root, output_dir)?;
    let files = collect(ctx, &root, output_dir)?;
    info!(
        input = %root.display(),
        base = %base_name,
        files = files.len(),
        scheme = %ctx.cipher.scheme(),
        "encrypting tree"
    );

    let collisions = find_collisions(ctx, &files, &base_name);
    run_batch(ctx, &root, &files, progress, |path| {
        if let Some(relative) = collisions.get(path) {
            return Err(JpcError::PathCollision(relative.clone()));
        }
        encrypt_file(ctx, path, &base_name, output_dir)
    })
}

/// Files whose embedded path repeats one already taken by an earlier file.
///
/// `in/a.txt` and `in/in/a.txt` both embed `in/a.txt`; the later one in walk
/// order is refused so decryption cannot restore one over the other.
fn find_collisions(
    ctx: &RunContext<'_>,
    files: &[PathBuf],
    base_name: &str,
) -> HashMap<PathBuf, String> {
    let mut seen = HashSet::new();
    let mut collisions = HashMap::new();
    for path in files {
        let Some(relative) = path
            .to_str()
            .and_then(|s| ctx.paths.relative_path(s, base_name).ok())
        else {
            continue;
        };
        let key = ctx.paths.normalize(&relative);
        if !seen.insert(key) {
            debug!(path = %path.display(), relative = %relative, "embedded path collision");
            collisions.insert(path.clone(), relative);
        }
    }
    collisions
}

/// Decrypt every container under `input_root` into `output_dir`.
pub fn decrypt_tree(
    ctx: &RunContext<'_>,
    input_root: &Path,
    output_dir: &Path,
    progress: Option<&ProgressFn>,
) -> JpcResult<RunReport> {
    let (_, root) = prepare(input_root, output_dir)?;
    let files = collect(ctx, &root, output_dir)?;
    info!(
        input = %root.display(),
        files = files.len(),
        scheme = %ctx.cipher.scheme(),
        "decrypting tree"
    );

    run_batch(ctx, &root, &files, progress, |path| {
        decrypt_file(ctx, path, output_dir)
    })
}

fn prepare(input_root: &Path, output_dir: &Path) -> JpcResult<(String, PathBuf)> {
    if !input_root.is_dir() {
        return Err(JpcError::Usage(format!(
            "input {} is not a directory",
            input_root.display()
        )));
    }
    let named = base_dir_name(input_root)?;
    std::fs::create_dir_all(output_dir)?;
    Ok(named)
}

fn collect(ctx: &RunContext<'_>, root: &Path, output_dir: &Path) -> JpcResult<Vec<PathBuf>> {
    let config = CollectConfig {
        exclude_patterns: ctx.config.run.exclude_patterns.clone(),
        skip_dir: Some(output_dir.to_path_buf()),
    };
    collect_files(root, &config)
}

fn run_batch<F>(
    ctx: &RunContext<'_>,
    root: &Path,
    files: &[PathBuf],
    progress: Option<&ProgressFn>,
    process: F,
) -> JpcResult<RunReport>
where
    F: Fn(&Path) -> JpcResult<FileOutcome> + Sync,
{
    let total = files.len() as u64;
    let done = AtomicU64::new(0);
    let step = |path: &Path| {
        let result = process(path);
        let i = done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = progress {
            let rel = path.strip_prefix(root).unwrap_or(path);
            cb(i, total, &format!("[{i}/{total}] {}", rel.display()));
        }
        result
    };

    let continue_on_error = ctx.config.run.continue_on_error;
    let workers = ctx.config.run.workers;
    let mut report = RunReport::default();

    if workers == 1 {
        for path in files {
            let result = step(path);
            settle(&mut report, path, result, continue_on_error)?;
        }
        return Ok(report);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| JpcError::Other(anyhow!("worker pool: {e}")))?;
    debug!(threads = pool.current_num_threads(), "worker pool started");

    if continue_on_error {
        let results: Vec<JpcResult<FileOutcome>> =
            pool.install(|| files.par_iter().map(|p| step(p)).collect());
        for (path, result) in files.iter().zip(results) {
            settle(&mut report, path, result, true)?;
        }
    } else {
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|p| {
                    step(p).inspect_err(|e| warn!(path = %p.display(), "failed: {e}"))
                })
                .collect::<JpcResult<Vec<_>>>()
        })?;
        for outcome in &outcomes {
            report.record(outcome);
        }
    }
    Ok(report)
}

/// Fold one file's result into the report. Fatal errors always end the run.
fn settle(
    report: &mut RunReport,
    path: &Path,
    result: JpcResult<FileOutcome>,
    continue_on_error: bool,
) -> JpcResult<()> {
    match result {
        Ok(outcome) => {
            report.record(&outcome);
            Ok(())
        }
        Err(e) if continue_on_error && !e.is_fatal() => {
            warn!(path = %path.display(), "failed: {e}");
            report.fail(path.to_path_buf(), &e);
            Ok(())
        }
        Err(e) => {
            warn!(path = %path.display(), "failed: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpc_core::config::CarrierConfig;
    use jpc_crypto::{AeadEnvelope, SymmetricKey};
    use tempfile::TempDir;

    fn small_config() -> JpcConfig {
        let mut config = JpcConfig::default();
        config.carrier = CarrierConfig {
            min_width: 8,
            max_width: 16,
            min_height: 8,
            max_height: 16,
            ..CarrierConfig::default()
        };
        config
    }

    fn cipher() -> AeadEnvelope {
        AeadEnvelope::new(Default::default(), SymmetricKey::from_bytes([7u8; 32]))
    }

    #[test]
    fn test_base_dir_name() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        std::fs::create_dir(&input).unwrap();

        let (name, root) = base_dir_name(&input).unwrap();
        assert_eq!(name, "in");
        assert_eq!(root, input);

        let (name, _) = base_dir_name(&input.join(".")).unwrap();
        assert_eq!(name, "in");
    }

    #[test]
    fn test_encrypt_file_names_container_by_uuid() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(input.join("x.txt"), b"payload").unwrap();

        let config = small_config();
        let cipher = cipher();
        let ctx = RunContext::new(&cipher, &config);

        let outcome = encrypt_file(&ctx, &input.join("x.txt"), "in", &out).unwrap();
        let FileOutcome::Written { target, bytes, .. } = outcome else {
            panic!("expected a written container");
        };
        assert_eq!(bytes, 7);
        assert_eq!(target.extension().unwrap(), "jpg");
        let stem = target.file_stem().unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(stem).is_ok());
    }

    #[test]
    fn test_encrypt_file_outside_base_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let stray = tmp.path().join("stray.txt");
        std::fs::write(&stray, b"x").unwrap();

        let config = small_config();
        let cipher = cipher();
        let ctx = RunContext::new(&cipher, &config);

        let err = encrypt_file(&ctx, &stray, "in", &out).unwrap_err();
        assert!(matches!(err, JpcError::PathNotUnderBase { .. }));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_decrypt_file_extension_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let out = tmp.path().join("out");
        let restored = tmp.path().join("restored");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(input.join("x.txt"), b"payload").unwrap();

        let config = small_config();
        let cipher = cipher();
        let ctx = RunContext::new(&cipher, &config);

        let FileOutcome::Written { target, .. } =
            encrypt_file(&ctx, &input.join("x.txt"), "in", &out).unwrap()
        else {
            panic!("expected a written container");
        };
        let upper = target.with_extension("JPG");
        std::fs::rename(&target, &upper).unwrap();

        let outcome = decrypt_file(&ctx, &upper, &restored).unwrap();
        assert!(matches!(outcome, FileOutcome::Written { bytes: 7, .. }));
        assert_eq!(
            std::fs::read(restored.join("in").join("x.txt")).unwrap(),
            b"payload"
        );

        let txt = tmp.path().join("notes.txt");
        std::fs::write(&txt, b"plain").unwrap();
        assert_eq!(
            decrypt_file(&ctx, &txt, &restored).unwrap(),
            FileOutcome::Skipped {
                path: txt.clone(),
                reason: SkipReason::Extension
            }
        );
    }

    #[test]
    fn test_decrypt_file_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let out = tmp.path().join("out");
        let restored = tmp.path().join("restored");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(input.join("x.txt"), b"payload").unwrap();

        let config = small_config();
        let cipher = cipher();
        let ctx = RunContext::new(&cipher, &config);

        let FileOutcome::Written { target, .. } =
            encrypt_file(&ctx, &input.join("x.txt"), "in", &out).unwrap()
        else {
            panic!("expected a written container");
        };
        std::fs::create_dir_all(restored.join("in")).unwrap();
        std::fs::write(restored.join("in").join("x.txt"), b"already here").unwrap();

        let err = decrypt_file(&ctx, &target, &restored).unwrap_err();
        assert!(matches!(err, JpcError::PathCollision(_)));
        assert_eq!(
            std::fs::read(restored.join("in").join("x.txt")).unwrap(),
            b"already here"
        );
    }

    #[test]
    fn test_fatal_error_ends_run_even_when_continuing() {
        let mut report = RunReport::default();
        let path = Path::new("c.jpg");

        settle(&mut report, path, Err(JpcError::Authentication), true).unwrap();
        assert_eq!(report.failures.len(), 1);

        let err = settle(&mut report, path, Err(JpcError::KeyLoad("no".into())), true);
        assert!(matches!(err, Err(JpcError::KeyLoad(_))));

        let err = settle(&mut report, path, Err(JpcError::Authentication), false);
        assert!(matches!(err, Err(JpcError::Authentication)));
    }
}
