//! Per-object encryption for writing.

use super::aes;
use super::rc4;
use super::Algorithm;
use crate::error::{Error, Result};
use md5::{Digest, Md5};

/// Encrypts strings and stream data of one document with a fixed key.
#[derive(Debug, Clone)]
pub struct EncryptionWriteHandler {
    /// Document key derived from the user password
    encryption_key: Vec<u8>,
    algorithm: Algorithm,
}

impl EncryptionWriteHandler {
    /// Create a handler from an already derived document key.
    pub fn from_key(encryption_key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            encryption_key,
            algorithm,
        }
    }

    /// The algorithm in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Object key (Algorithm 1): MD5 of the document key, the low three bytes
    /// of the object number and two bytes of generation, plus `sAlT` for AES.
    /// Truncated to `min(n + 5, 16)` bytes.
    pub fn derive_object_key(&self, obj_num: u32, gen_num: u16) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(&self.encryption_key);
        hasher.update(&obj_num.to_le_bytes()[..3]);
        hasher.update(gen_num.to_le_bytes());
        if self.algorithm.is_aes() {
            hasher.update(b"sAlT");
        }
        let hash = hasher.finalize();
        let len = (self.encryption_key.len() + 5).min(16);
        hash[..len].to_vec()
    }

    /// Encrypt a string value of object `obj_num`.
    pub fn encrypt_string(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Result<Vec<u8>> {
        self.encrypt(data, obj_num, gen_num)
    }

    /// Encrypt the data of stream object `obj_num`. AES output carries its
    /// random IV in the first 16 bytes.
    pub fn encrypt_stream(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Result<Vec<u8>> {
        self.encrypt(data, obj_num, gen_num)
    }

    fn encrypt(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Result<Vec<u8>> {
        let key = self.derive_object_key(obj_num, gen_num);
        match self.algorithm {
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => Ok(rc4::rc4_crypt(&key, data)),
            Algorithm::Aes128 => {
                let iv = Self::generate_iv();
                let ciphertext = aes::aes128_encrypt(&key, &iv, data).map_err(|reason| {
                    Error::Protection(format!("AES encryption of object {} failed: {}", obj_num, reason))
                })?;
                let mut out = iv.to_vec();
                out.extend(ciphertext);
                Ok(out)
            },
        }
    }

    /// Random 16-byte IV from a v4 UUID and the clock.
    fn generate_iv() -> [u8; 16] {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let mut hasher = Md5::new();
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        hasher.update(now.as_nanos().to_le_bytes());
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&hasher.finalize());
        iv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_lengths() {
        let rc4_40 = EncryptionWriteHandler::from_key(vec![1; 5], Algorithm::Rc4_40);
        assert_eq!(rc4_40.derive_object_key(1, 0).len(), 10);

        let rc4_128 = EncryptionWriteHandler::from_key(vec![1; 16], Algorithm::Rc4_128);
        assert_eq!(rc4_128.derive_object_key(1, 0).len(), 16);
    }

    #[test]
    fn test_object_keys_differ_per_object() {
        let handler = EncryptionWriteHandler::from_key(vec![7; 5], Algorithm::Rc4_40);
        assert_ne!(handler.derive_object_key(1, 0), handler.derive_object_key(2, 0));
    }

    #[test]
    fn test_aes_salt_changes_key() {
        let rc4 = EncryptionWriteHandler::from_key(vec![3; 16], Algorithm::Rc4_128);
        let aes = EncryptionWriteHandler::from_key(vec![3; 16], Algorithm::Aes128);
        assert_ne!(rc4.derive_object_key(5, 0), aes.derive_object_key(5, 0));
    }

    #[test]
    fn test_rc4_string_round_trip() {
        let handler = EncryptionWriteHandler::from_key(vec![0xAB; 5], Algorithm::Rc4_40);
        let encrypted = handler.encrypt_string(b"Title", 4, 0).unwrap();
        assert_ne!(encrypted, b"Title");
        let key = handler.derive_object_key(4, 0);
        assert_eq!(rc4::rc4_crypt(&key, &encrypted), b"Title");
    }

    #[test]
    fn test_aes_stream_round_trip() {
        let handler = EncryptionWriteHandler::from_key(vec![0x11; 16], Algorithm::Aes128);
        let encrypted = handler.encrypt_stream(b"BT ET", 9, 0).unwrap();
        assert_eq!(encrypted.len(), 32);
        let key = handler.derive_object_key(9, 0);
        let plain = aes::aes128_decrypt(&key, &encrypted[..16], &encrypted[16..]).unwrap();
        assert_eq!(plain, b"BT ET");
    }

    #[test]
    fn test_aes_with_short_key_is_an_error() {
        // Object keys for AES are truncated to key length + 5 bytes.
        let handler = EncryptionWriteHandler::from_key(vec![0x22; 5], Algorithm::Aes128);
        assert_eq!(handler.derive_object_key(1, 0).len(), 10);
        let err = handler.encrypt_stream(b"q Q", 1, 0).unwrap_err();
        assert!(matches!(err, Error::Protection(_)));
    }
}
