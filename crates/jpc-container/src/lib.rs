//! jpc-container: hide an encrypted file inside an ordinary-looking JPEG
//!
//! Container layout (bit-exact):
//! ```text
//! [ carrier JPEG: FFD8 ... FFD9 ]
//! [ encrypted payload           ]
//! [ PATH_MARKER (8 bytes)       ]
//! [ encrypted relative path     ]
//! [ nonce                       ]   AEAD scheme only
//! ```
//!
//! - `marker`: locating the carrier's end-of-image
//! - `trailer`: building, appending, locating and opening the hidden region
//! - `path`: relative-path extraction and separator-aware restore
//! - `carrier`: random single-colour placeholder JPEGs

pub mod carrier;
pub mod marker;
pub mod path;
pub mod trailer;

pub use carrier::write_carrier;
pub use marker::find_end_of_image;
pub use path::PathCodec;
pub use trailer::{append, append_file, build_trailer, locate, open, Recovered, TrailerRegions};

/// Separates the payload ciphertext from the path ciphertext.
pub const PATH_MARKER: [u8; 8] = [0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0xCB, 0xEE];
