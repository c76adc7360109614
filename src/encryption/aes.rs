//! AES-128-CBC with PKCS#7 padding, as used by the `AESV2` crypt filter.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK: usize = 16;

/// Encrypt `data` with a 16-byte key and IV. Output is padded ciphertext
/// without the IV.
pub fn aes128_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if key.len() != BLOCK || iv.len() != BLOCK {
        return Err("AES-128 key and IV must be 16 bytes");
    }

    let pad = BLOCK - data.len() % BLOCK;
    let mut buffer = data.to_vec();
    buffer.resize(data.len() + pad, pad as u8);

    let len = buffer.len();
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| "AES encryption failed")?;
    Ok(buffer)
}

/// Decrypt `data` (IV not included) and strip PKCS#7 padding.
pub fn aes128_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if key.len() != BLOCK || iv.len() != BLOCK {
        return Err("AES-128 key and IV must be 16 bytes");
    }
    if data.is_empty() || data.len() % BLOCK != 0 {
        return Err("ciphertext length must be a positive multiple of 16");
    }

    let mut buffer = data.to_vec();
    let plain_len = Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| "AES decryption failed")?
        .len();

    let pad = buffer[plain_len - 1] as usize;
    if pad == 0 || pad > BLOCK || buffer[plain_len - pad..plain_len].iter().any(|&b| b as usize != pad) {
        return Err("invalid PKCS#7 padding");
    }
    buffer.truncate(plain_len - pad);
    Ok(buffer)
}
