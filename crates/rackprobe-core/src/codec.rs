// ── Transfer encoding detection ──
//
// Collectors may ship command output raw, base64 encoded, zlib
// compressed, or compressed then encoded. `uncompress_base64_data` peels
// off whichever of those layers is present.

use std::io::Read;

use base64::{Engine as _, engine::general_purpose};
use flate2::read::ZlibDecoder;

/// Decode base64 (if the whole input is valid base64, whitespace ignored),
/// then inflate zlib (if the result is a valid zlib stream). Each layer
/// that does not apply is skipped, so raw input comes back unchanged.
pub fn uncompress_base64_data(data: &[u8]) -> Vec<u8> {
    let decoded = decode_base64(data).unwrap_or_else(|| data.to_vec());
    inflate_zlib(&decoded).unwrap_or(decoded)
}

fn decode_base64(data: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }
    general_purpose::STANDARD.decode(&compact).ok()
}

fn inflate_zlib(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).ok()?;
    Some(out)
}
