use thiserror::Error;

pub type JpcResult<T> = Result<T, JpcError>;

#[derive(Debug, Error)]
pub enum JpcError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("key load error: {0}")]
    KeyLoad(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("authentication failed: wrong key or tampered ciphertext")]
    Authentication,

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("not a container: no end-of-image marker")]
    NotAContainer,

    #[error("no hidden payload after end-of-image marker")]
    NoPayload,

    #[error("path {path} is not under base directory {base}")]
    PathNotUnderBase { path: String, base: String },

    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    #[error("refusing unsafe recovered path: {0}")]
    UnsafePath(String),

    /// Two files map to the same embedded or restored path
    #[error("path collision: {0} is already claimed by another file")]
    PathCollision(String),

    #[error("carrier image error: {0}")]
    Carrier(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JpcError {
    /// Plain images and non-JPEG files: skipped quietly during decrypt.
    pub fn is_skippable(&self) -> bool {
        matches!(self, JpcError::NotAContainer | JpcError::NoPayload)
    }

    /// Conditions that end the whole run before any file is touched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JpcError::Usage(_) | JpcError::KeyLoad(_) | JpcError::Config(_)
        )
    }
}
