use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{JpcError, JpcResult};

/// Top-level configuration (loaded from jpc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JpcConfig {
    pub cipher: CipherConfig,
    pub carrier: CarrierConfig,
    pub paths: PathsConfig,
    pub run: RunConfig,
    pub log: LogConfig,
}

/// Which envelope scheme a key file is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeChoice {
    /// PEM files select RSA-OAEP, anything else is a raw AEAD key
    #[default]
    Auto,
    Aead,
    RsaOaep,
}

/// AEAD algorithm for the symmetric scheme. Both take a 256-bit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AeadAlgorithm {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub fn nonce_len(self) -> usize {
        match self {
            AeadAlgorithm::Aes256Gcm => 12,
            AeadAlgorithm::XChaCha20Poly1305 => 24,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AeadAlgorithm::Aes256Gcm => "aes-256-gcm",
            AeadAlgorithm::XChaCha20Poly1305 => "xchacha20-poly1305",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub scheme: SchemeChoice,
    pub aead: AeadAlgorithm,
}

/// Placeholder JPEG generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    /// JPEG quality, 1..=100
    pub quality: u8,
    /// Extension of generated containers; also selects decrypt candidates
    pub extension: String,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            min_width: 1000,
            max_width: 5000,
            min_height: 1000,
            max_height: 5000,
            quality: 90,
            extension: "jpg".into(),
        }
    }
}

/// Separators recognized in embedded relative paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Separator written to disk on this host
    pub native_separator: char,
    /// Separator rewritten to `native_separator` on restore
    pub foreign_separator: char,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let native = std::path::MAIN_SEPARATOR;
        Self {
            native_separator: native,
            foreign_separator: if native == '/' { '\\' } else { '/' },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Record per-file failures and keep going (false = abort on first)
    pub continue_on_error: bool,
    /// Worker threads (0 = cpu_count, 1 = sequential)
    pub workers: usize,
    /// Glob patterns matched against file names, excluded from the walk
    pub exclude_patterns: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            workers: 1,
            exclude_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl JpcConfig {
    pub fn from_toml_str(s: &str) -> JpcResult<Self> {
        let config: JpcConfig =
            toml::from_str(s).map_err(|e| JpcError::Config(format!("parsing TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> JpcResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| JpcError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> JpcResult<()> {
        let c = &self.carrier;
        if c.min_width == 0 || c.min_height == 0 {
            return Err(JpcError::Config("carrier dimensions must be non-zero".into()));
        }
        if c.min_width > c.max_width || c.min_height > c.max_height {
            return Err(JpcError::Config(format!(
                "carrier ranges inverted: width {}..={}, height {}..={}",
                c.min_width, c.max_width, c.min_height, c.max_height
            )));
        }
        if !(1..=100).contains(&c.quality) {
            return Err(JpcError::Config(format!(
                "carrier quality must be 1..=100, got {}",
                c.quality
            )));
        }
        if c.extension.is_empty() || c.extension.contains('.') {
            return Err(JpcError::Config(format!(
                "carrier extension must be a bare extension, got {:?}",
                c.extension
            )));
        }
        if self.paths.native_separator == self.paths.foreign_separator {
            return Err(JpcError::Config(
                "native and foreign separators must differ".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[cipher]
scheme = "rsa-oaep"
aead = "xchacha20-poly1305"

[carrier]
min_width = 64
max_width = 128
min_height = 32
max_height = 48
quality = 75
extension = "jpeg"

[paths]
native_separator = "\\"
foreign_separator = "/"

[run]
continue_on_error = false
workers = 4
exclude_patterns = ["*.tmp", ".DS_Store"]

[log]
level = "debug"
format = "json"
"#;
        let config = JpcConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.cipher.scheme, SchemeChoice::RsaOaep);
        assert_eq!(config.cipher.aead, AeadAlgorithm::XChaCha20Poly1305);
        assert_eq!(config.carrier.max_width, 128);
        assert_eq!(config.carrier.quality, 75);
        assert_eq!(config.carrier.extension, "jpeg");
        assert_eq!(config.paths.native_separator, '\\');
        assert_eq!(config.paths.foreign_separator, '/');
        assert!(!config.run.continue_on_error);
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.exclude_patterns.len(), 2);
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = JpcConfig::from_toml_str("").unwrap();

        assert_eq!(config.cipher.scheme, SchemeChoice::Auto);
        assert_eq!(config.cipher.aead, AeadAlgorithm::Aes256Gcm);
        assert_eq!(config.carrier.min_width, 1000);
        assert_eq!(config.carrier.max_height, 5000);
        assert_eq!(config.carrier.extension, "jpg");
        assert_eq!(config.paths.native_separator, std::path::MAIN_SEPARATOR);
        assert!(config.run.continue_on_error);
        assert_eq!(config.run.workers, 1);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[carrier]
quality = 60
"#;
        let config = JpcConfig::from_toml_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.carrier.quality, 60);
        // Defaults
        assert_eq!(config.carrier.min_width, 1000);
        assert_eq!(config.cipher.scheme, SchemeChoice::Auto);
    }

    #[test]
    fn test_rejects_inverted_ranges() {
        let toml_str = r#"
[carrier]
min_width = 500
max_width = 100
"#;
        let err = JpcConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, JpcError::Config(_)));
    }

    #[test]
    fn test_rejects_same_separators() {
        let toml_str = r#"
[paths]
native_separator = "/"
foreign_separator = "/"
"#;
        assert!(JpcConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let toml_str = r#"
[cipher]
scheme = "rot13"
"#;
        assert!(JpcConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = JpcConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.carrier.quality, 90);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jpc.toml");
        std::fs::write(&path, "[run]\nworkers = 0\n").unwrap();

        let config = JpcConfig::load(&path).unwrap();
        assert_eq!(config.run.workers, 0);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = JpcConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = JpcConfig::from_toml_str(&toml_str).unwrap();

        assert_eq!(config.carrier.extension, parsed.carrier.extension);
        assert_eq!(config.cipher.aead, parsed.cipher.aead);
        assert_eq!(config.paths.native_separator, parsed.paths.native_separator);
    }
}
