//! jpc: hide files behind JPEG carriers
//!
//! Commands:
//!   encrypt <key> <input_dir> <output_dir>   - one container per input file
//!   decrypt <key> <input_dir> <output_dir>   - restore the original tree
//!   keygen symmetric <out>                   - random 32-byte AEAD key
//!   keygen rsa <private_out> <public_out>    - RSA key pair as PEM
//!   config show                              - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use jpc_core::JpcConfig;
use jpc_crypto::{Envelope, EnvelopeCipher, DEFAULT_RSA_BITS};
use jpc_engine::{ProgressFn, RunContext, RunReport};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "jpc",
    version,
    about = "Hide encrypted files behind JPEG images",
    long_about = "jpc: encrypt a directory tree into innocuous JPEG containers and restore it"
)]
struct Cli {
    /// Path to jpc.toml configuration file
    #[arg(long, short = 'c', env = "JPC_CONFIG", default_value = "jpc.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "JPC_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Print the run report as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Abort on the first failed file
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Worker threads (0 = one per CPU, 1 = sequential)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt every file under INPUT_DIR into a JPEG container in OUTPUT_DIR
    Encrypt {
        /// Key file: raw 32 bytes, or an RSA public/private key in PEM
        key: PathBuf,
        input_dir: PathBuf,
        output_dir: PathBuf,
    },

    /// Restore every container under INPUT_DIR into OUTPUT_DIR
    Decrypt {
        /// Key file: raw 32 bytes, or an RSA private key in PEM
        key: PathBuf,
        input_dir: PathBuf,
        output_dir: PathBuf,
    },

    /// Generate key files
    Keygen {
        #[command(subcommand)]
        kind: KeygenKind,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeygenKind {
    /// Random 256-bit key for the AEAD scheme
    Symmetric { out: PathBuf },

    /// RSA key pair: PKCS#1 private key and SPKI public key
    Rsa {
        private_out: PathBuf,
        public_out: PathBuf,
        /// Modulus size in bits
        #[arg(long, default_value_t = DEFAULT_RSA_BITS)]
        bits: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypt",
            Direction::Decrypt => "decrypt",
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (mut config, found) = load_config(&cli.config)?;
    apply_overrides(&mut config, &cli);

    let format = parse_log_format(&config.log.format)?;
    init_logging(&config.log.level, format);
    if !found {
        warn!("config file not found: {}  (using defaults)", cli.config.display());
    }

    match cli.command {
        Commands::Encrypt { ref key, ref input_dir, ref output_dir } => {
            cmd_run(&config, Direction::Encrypt, key, input_dir, output_dir, cli.json)
        }
        Commands::Decrypt { ref key, ref input_dir, ref output_dir } => {
            cmd_run(&config, Direction::Decrypt, key, input_dir, output_dir, cli.json)
        }
        Commands::Keygen { kind: KeygenKind::Symmetric { ref out } } => {
            cmd_keygen_symmetric(out).map(|()| ExitCode::SUCCESS)
        }
        Commands::Keygen { kind: KeygenKind::Rsa { ref private_out, ref public_out, bits } } => {
            cmd_keygen_rsa(private_out, public_out, bits).map(|()| ExitCode::SUCCESS)
        }
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(&config, &cli.config).map(|()| ExitCode::SUCCESS)
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Runs before logging is up, so a missing file is reported back to the
/// caller instead of logged here.
fn load_config(path: &Path) -> Result<(JpcConfig, bool)> {
    if !path.exists() {
        return Ok((JpcConfig::default(), false));
    }
    let config =
        JpcConfig::load(path).with_context(|| format!("loading config: {}", path.display()))?;
    Ok((config, true))
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut JpcConfig, cli: &Cli) {
    if let Some(level) = &cli.log {
        config.log.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log.format = match format {
            LogFormat::Json => "json".into(),
            LogFormat::Text => "text".into(),
        };
    }
    if cli.fail_fast {
        config.run.continue_on_error = false;
    }
    if let Some(workers) = cli.workers {
        config.run.workers = workers;
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat> {
    LogFormat::from_str(s, true)
        .map_err(|_| anyhow::anyhow!("unknown log format {s:?} (json, text)"))
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ── `jpc encrypt` / `jpc decrypt` ─────────────────────────────────────────────

fn cmd_run(
    config: &JpcConfig,
    direction: Direction,
    key: &Path,
    input_dir: &Path,
    output_dir: &Path,
    json: bool,
) -> Result<ExitCode> {
    let material = jpc_crypto::load_key_material(key, config.cipher.scheme)
        .with_context(|| format!("loading key: {}", key.display()))?;
    let cipher = Envelope::from_key_material(material, config.cipher.aead);
    let ctx = RunContext::new(&cipher, config);

    info!(
        direction = direction.label(),
        scheme = %cipher.scheme(),
        input = %input_dir.display(),
        output = %output_dir.display(),
        "starting run"
    );

    let pb = (!json).then(|| make_progress_bar(0, direction.label()));
    let progress: Option<ProgressFn> = pb.as_ref().map(|pb| {
        let pb = pb.clone();
        let cb: ProgressFn = Box::new(move |done, total, msg| {
            pb.set_length(total);
            pb.set_position(done);
            pb.set_message(msg.to_string());
        });
        cb
    });

    let result = match direction {
        Direction::Encrypt => {
            jpc_engine::encrypt_tree(&ctx, input_dir, output_dir, progress.as_ref())
        }
        Direction::Decrypt => {
            jpc_engine::decrypt_tree(&ctx, input_dir, output_dir, progress.as_ref())
        }
    };
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let report = result.with_context(|| {
        format!("{} {} → {}", direction.label(), input_dir.display(), output_dir.display())
    })?;

    if json {
        let rendered = serde_json::to_string_pretty(&report).context("serializing run report")?;
        println!("{rendered}");
    } else {
        print_summary(direction, &report);
    }

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(direction: Direction, report: &RunReport) {
    let verb = match direction {
        Direction::Encrypt => "Encrypt",
        Direction::Decrypt => "Decrypt",
    };
    println!("{verb} complete:");
    println!("  written:  {} files ({})", report.processed, fmt_bytes(report.bytes));
    println!("  skipped:  {} files", report.skipped);
    println!("  failed:   {} files", report.failures.len());
    for failure in &report.failures {
        println!("    {}: {}", failure.path.display(), failure.error);
    }
}

// ── `jpc keygen` ──────────────────────────────────────────────────────────────

fn cmd_keygen_symmetric(out: &Path) -> Result<()> {
    let key = jpc_crypto::generate_symmetric_key();
    write_key_file(out, key.as_bytes(), true)?;
    println!("symmetric key: {}", out.display());
    Ok(())
}

fn cmd_keygen_rsa(private_out: &Path, public_out: &Path, bits: usize) -> Result<()> {
    if bits < 2048 {
        warn!(bits, "RSA modulus below 2048 bits");
    }
    let private = jpc_crypto::generate_rsa_key(bits).context("generating RSA key")?;
    let private_pem = jpc_crypto::encode_rsa_private_pem(&private)?;
    let public_pem = jpc_crypto::encode_rsa_public_pem(&private.to_public_key())?;

    write_key_file(private_out, private_pem.as_bytes(), true)?;
    write_key_file(public_out, public_pem.as_bytes(), false)?;

    println!("private key: {} ({bits} bits)", private_out.display());
    println!("public key:  {}", public_out.display());
    Ok(())
}

/// Create `path` with `contents`. Never overwrites; secrets are owner-only on unix.
#[cfg_attr(not(unix), allow(unused_variables))]
fn write_key_file(path: &Path, contents: &[u8], secret: bool) -> Result<()> {
    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(if secret { 0o600 } else { 0o644 });
    }
    let mut file = opts
        .open(path)
        .with_context(|| format!("creating key file: {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("writing key file: {}", path.display()))?;
    Ok(())
}

// ── `jpc config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &JpcConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
