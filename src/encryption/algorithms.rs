//! Standard security handler key derivation (ISO 32000-1, 7.6.3.3).
//!
//! Only the writing side is implemented: computing the document key and the
//! `/O` and `/U` entries for revisions 2 to 4.

use super::rc4::rc4_crypt;
use md5::{Digest, Md5};

/// Password padding string (Algorithm 2, step a).
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Pad or truncate a password to exactly 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// MD5 `hash`, then for revision 3 and up re-hash the first `key_len` bytes
/// fifty more times.
fn stretch(mut hash: Vec<u8>, revision: u32, key_len: usize) -> Vec<u8> {
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_len]).to_vec();
        }
    }
    hash.truncate(key_len);
    hash
}

/// Run RC4 once with `key`, then for revision 3 and up nineteen more times
/// with each key byte XORed by the round number.
fn rc4_rounds(key: &[u8], data: &[u8], revision: u32) -> Vec<u8> {
    let mut out = rc4_crypt(key, data);
    if revision >= 3 {
        for round in 1..=19u8 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
            out = rc4_crypt(&round_key, &out);
        }
    }
    out
}

/// Compute the `/O` entry (Algorithm 3). An empty owner password falls back
/// to the user password.
pub fn compute_owner_hash(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_len: usize,
) -> Vec<u8> {
    let password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let digest = Md5::digest(pad_password(password)).to_vec();
    let rc4_key = stretch(digest, revision, key_len);
    rc4_rounds(&rc4_key, &pad_password(user_password), revision)
}

/// Compute the document encryption key from the user password (Algorithm 2).
pub fn compute_encryption_key(
    user_password: &[u8],
    owner_hash: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_len: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(owner_hash);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF; 4]);
    }
    stretch(hasher.finalize().to_vec(), revision, key_len)
}

/// Compute the `/U` entry (Algorithm 4 for revision 2, Algorithm 5 above).
pub fn compute_user_hash(key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision < 3 {
        return rc4_crypt(key, &PADDING);
    }

    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = rc4_rounds(key, &hasher.finalize(), revision);
    // Arbitrary padding to 32 bytes.
    hash.resize(32, 0);
    hash
}
