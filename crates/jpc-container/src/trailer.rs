//! The hidden trailer: `payload_ct || PATH_MARKER || path_region [|| nonce]`
//!
//! For nonce-based ciphers the path region is `path_nonce || path_ct` and the
//! trailing nonce belongs to the payload, so no nonce is sealed twice under
//! one key. Containers from the earlier revision sealed the path under the
//! trailing nonce directly; `open` still reads those.
//!
//! The marker is not escaped. A marker that happens to land inside the
//! payload ciphertext makes the first split fail to decrypt, and `open`
//! then tries the next occurrence.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use jpc_core::{JpcError, JpcResult};
use jpc_crypto::EnvelopeCipher;
use tracing::debug;

use crate::marker::{find_bytes, find_end_of_image};
use crate::PATH_MARKER;

/// Borrowed views into a container's trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerRegions<'a> {
    /// Offset one past the carrier's end-of-image marker
    pub carrier_end: usize,
    /// Offset of the path marker that split this trailer
    pub marker_offset: usize,
    pub payload: &'a [u8],
    pub path: &'a [u8],
    pub nonce: Option<&'a [u8]>,
}

/// Plaintext recovered from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub payload: Vec<u8>,
    /// Raw path bytes; `PathCodec::restore_path` decodes them
    pub relative_path: Vec<u8>,
}

/// Encrypt `plaintext` and `relative_path` separately and lay out the trailer.
pub fn build_trailer<C: EnvelopeCipher + ?Sized>(
    cipher: &C,
    plaintext: &[u8],
    relative_path: &str,
) -> JpcResult<Vec<u8>> {
    let payload = cipher.encrypt(plaintext)?;
    let path = cipher.encrypt(relative_path.as_bytes())?;

    let nonce_bytes = |n: &Option<Vec<u8>>| n.as_ref().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(
        payload.ciphertext.len()
            + PATH_MARKER.len()
            + nonce_bytes(&path.nonce)
            + path.ciphertext.len()
            + nonce_bytes(&payload.nonce),
    );
    out.extend_from_slice(&payload.ciphertext);
    out.extend_from_slice(&PATH_MARKER);
    if let Some(nonce) = &path.nonce {
        out.extend_from_slice(nonce);
    }
    out.extend_from_slice(&path.ciphertext);
    if let Some(nonce) = &payload.nonce {
        out.extend_from_slice(nonce);
    }
    Ok(out)
}

/// Append a trailer to an existing carrier file. The carrier is not re-encoded
/// and the file is never created here.
///
/// Returns the number of trailer bytes written.
pub fn append<C: EnvelopeCipher + ?Sized>(
    container_path: &Path,
    plaintext: &[u8],
    relative_path: &str,
    cipher: &C,
) -> JpcResult<u64> {
    let trailer = build_trailer(cipher, plaintext, relative_path)?;

    let mut file = OpenOptions::new().append(true).open(container_path)?;
    file.write_all(&trailer)?;
    file.flush()?;

    debug!(
        container = %container_path.display(),
        payload = plaintext.len(),
        trailer = trailer.len(),
        "trailer appended"
    );
    Ok(trailer.len() as u64)
}

/// Read `source_path` fully and append it to the carrier at `container_path`.
pub fn append_file<C: EnvelopeCipher + ?Sized>(
    container_path: &Path,
    source_path: &Path,
    relative_path: &str,
    cipher: &C,
) -> JpcResult<u64> {
    let plaintext = std::fs::read(source_path)?;
    append(container_path, &plaintext, relative_path, cipher)
}

/// Split a container at the first path marker after the carrier.
///
/// `NotAContainer` without an end-of-image marker, `NoPayload` when nothing
/// marker-delimited follows it.
pub fn locate(data: &[u8], nonce_len: usize) -> JpcResult<TrailerRegions<'_>> {
    let carrier_end = find_end_of_image(data).ok_or(JpcError::NotAContainer)?;
    let marker_offset = find_bytes(data, &PATH_MARKER, carrier_end).ok_or(JpcError::NoPayload)?;
    regions_at(data, carrier_end, marker_offset, nonce_len)
}

fn regions_at(
    data: &[u8],
    carrier_end: usize,
    marker_offset: usize,
    nonce_len: usize,
) -> JpcResult<TrailerRegions<'_>> {
    let path_start = marker_offset + PATH_MARKER.len();
    if data.len() < path_start + nonce_len {
        return Err(JpcError::CorruptContainer(format!(
            "{} bytes after the path marker, nonce alone needs {nonce_len}",
            data.len() - path_start.min(data.len())
        )));
    }
    let nonce_start = data.len() - nonce_len;

    Ok(TrailerRegions {
        carrier_end,
        marker_offset,
        payload: &data[carrier_end..marker_offset],
        path: &data[path_start..nonce_start],
        nonce: (nonce_len > 0).then(|| &data[nonce_start..]),
    })
}

/// Locate and decrypt payload and path.
pub fn open<C: EnvelopeCipher + ?Sized>(data: &[u8], cipher: &C) -> JpcResult<Recovered> {
    let nonce_len = cipher.nonce_len();
    let first = locate(data, nonce_len)?;

    let first_err = match decrypt_regions(&first, cipher) {
        Ok(recovered) => return Ok(recovered),
        Err(e @ JpcError::KeyLoad(_)) => return Err(e),
        Err(e) => e,
    };

    let mut search_from = first.marker_offset + 1;
    while let Some(marker_offset) = find_bytes(data, &PATH_MARKER, search_from) {
        search_from = marker_offset + 1;
        let Ok(regions) = regions_at(data, first.carrier_end, marker_offset, nonce_len) else {
            break;
        };
        debug!(marker_offset, "first split did not decrypt, trying later path marker");
        if let Ok(recovered) = decrypt_regions(&regions, cipher) {
            return Ok(recovered);
        }
    }
    Err(first_err)
}

fn decrypt_regions<C: EnvelopeCipher + ?Sized>(
    regions: &TrailerRegions<'_>,
    cipher: &C,
) -> JpcResult<Recovered> {
    // Path first: it is short, and a wrong split fails here cheaply
    let relative_path = open_path(regions, cipher)?;
    let payload = cipher
        .decrypt(regions.payload, regions.nonce)
        .map_err(|e| corrupt("payload", e))?;
    Ok(Recovered {
        payload,
        relative_path,
    })
}

fn open_path<C: EnvelopeCipher + ?Sized>(
    regions: &TrailerRegions<'_>,
    cipher: &C,
) -> JpcResult<Vec<u8>> {
    let Some(trailer_nonce) = regions.nonce else {
        return cipher
            .decrypt(regions.path, None)
            .map_err(|e| corrupt("path", e));
    };

    if regions.path.len() >= trailer_nonce.len() {
        let (path_nonce, ciphertext) = regions.path.split_at(trailer_nonce.len());
        if let Ok(path) = cipher.decrypt(ciphertext, Some(path_nonce)) {
            return Ok(path);
        }
    }

    // Earlier revision: path sealed under the payload's nonce
    cipher
        .decrypt(regions.path, Some(trailer_nonce))
        .map_err(|e| corrupt("path", e))
}

fn corrupt(region: &str, err: JpcError) -> JpcError {
    match err {
        JpcError::KeyLoad(_) => err,
        other => JpcError::CorruptContainer(format!("{region} region: {other}")),
    }
}
