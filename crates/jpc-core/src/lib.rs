pub mod config;
pub mod error;

pub use config::JpcConfig;
pub use error::{JpcError, JpcResult};
