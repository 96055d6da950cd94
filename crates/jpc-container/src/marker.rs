//! Finding where the carrier JPEG ends.
//!
//! Segments are skipped by their declared length and entropy-coded data by
//! its stuffing rules, so an `FFD9` inside an APP segment (EXIF thumbnails
//! carry a whole JPEG) is not taken for the carrier's end. Streams the walk
//! cannot follow fall back to the first raw `FFD9`.

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const TEM: u8 = 0x01;

const EOI_BYTES: [u8; 2] = [0xFF, EOI];

/// Offset one past the carrier's end-of-image marker, or `None` if it has none.
pub fn find_end_of_image(data: &[u8]) -> Option<usize> {
    walk_segments(data).or_else(|| find_bytes(data, &EOI_BYTES, 0).map(|pos| pos + 2))
}

/// First index `>= from` where `needle` starts.
pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

fn is_rst(marker: u8) -> bool {
    (0xD0..=0xD7).contains(&marker)
}

fn walk_segments(data: &[u8]) -> Option<usize> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return None;
    }
    let mut pos = 2;

    loop {
        if *data.get(pos)? != 0xFF {
            return None;
        }
        // Fill bytes
        while *data.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            EOI => return Some(pos),
            TEM => continue,
            m if is_rst(m) => continue,
            0x00 | SOI => return None,
            _ => {}
        }

        let length = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]) as usize;
        if length < 2 || pos + length > data.len() {
            return None;
        }
        pos += length;

        if marker == SOS {
            pos = skip_entropy_coded(data, pos)?;
        }
    }
}

/// Offset of the `0xFF` that starts the first real marker after scan data.
fn skip_entropy_coded(data: &[u8], mut pos: usize) -> Option<usize> {
    while pos + 1 < data.len() {
        if data[pos] == 0xFF {
            let next = data[pos + 1];
            if next == 0x00 || is_rst(next) {
                pos += 2;
                continue;
            }
            return Some(pos);
        }
        pos += 1;
    }
    None
}
