//! Byte-string helpers shared by the key and session code.

use digest::Digest;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::KeyrollError;

/// Timing-safe byte-string equality.
///
/// Returns false immediately when the lengths differ; for equal lengths
/// the comparison touches every byte regardless of where the first
/// mismatch sits.
pub fn safe_equals(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Leading 4 bytes of SHA-1 over each part prefixed with its 4-byte
/// big-endian length. This value identifies a key across compatible
/// implementations, so its construction must not change.
pub(crate) fn key_hash(parts: &[&[u8]]) -> [u8; 4] {
    let mut sha = Sha1::new();
    for part in parts {
        sha.update((part.len() as u32).to_be_bytes());
        sha.update(part);
    }
    let digest = sha.finalize();
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Strips leading zero bytes from a big-endian integer so that a
/// two's-complement encoding and a bare magnitude hash identically.
pub(crate) fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Packs byte strings as a 4-byte big-endian count followed by each
/// string prefixed with its 4-byte big-endian length.
pub(crate) fn len_prefix_pack(parts: &[&[u8]]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| 4 + p.len()).sum();
    let mut out = Vec::with_capacity(4 + total);
    out.extend_from_slice(&(parts.len() as u32).to_be_bytes());
    for part in parts {
        out.extend_from_slice(&(part.len() as u32).to_be_bytes());
        out.extend_from_slice(part);
    }
    out
}

pub(crate) fn len_prefix_unpack(bytes: &[u8]) -> Result<Vec<Vec<u8>>, KeyrollError> {
    let (count, mut rest) = read_u32(bytes)?;
    let mut parts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (len, tail) = read_u32(rest)?;
        let len = len as usize;
        if tail.len() < len {
            return Err(KeyrollError::FormatError);
        }
        parts.push(tail[..len].to_vec());
        rest = &tail[len..];
    }
    if !rest.is_empty() {
        return Err(KeyrollError::FormatError);
    }
    Ok(parts)
}

pub(crate) fn read_u32(bytes: &[u8]) -> Result<(u32, &[u8]), KeyrollError> {
    let (head, tail) = bytes.split_first_chunk::<4>().ok_or(KeyrollError::FormatError)?;
    Ok((u32::from_be_bytes(*head), tail))
}
