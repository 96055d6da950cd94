//! jpc-engine: drives containers over whole directory trees
//!
//! - `collect`: deterministic recursive file listing with exclusions
//! - `engine`: per-file encrypt/decrypt and the batch runners
//! - `report`: what a run did, serializable for `--json`

pub mod collect;
pub mod engine;
pub mod report;

pub use collect::{collect_files, CollectConfig};
pub use engine::{
    base_dir_name, decrypt_file, decrypt_tree, encrypt_file, encrypt_tree, FileOutcome,
    ProgressFn, RunContext, SkipReason,
};
pub use report::{FileFailure, RunReport};
