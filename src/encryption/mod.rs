//! Standard security handler for writing protected documents.
//!
//! Implements the password-based handler of ISO 32000-1, 7.6.3:
//!
//! - RC4 with a 40-bit key (V=1, R=2), the default
//! - RC4 with a 128-bit key (V=2, R=3)
//! - AES-128 in CBC mode (V=4, R=4, `AESV2` crypt filter)
//!
//! The document key is derived once, when protection is configured. The file
//! identifier used in the derivation is empty; the trailer carries a matching
//! `/ID [() ()]`.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use bitflags::bitflags;

mod aes;
mod algorithms;
mod rc4;
mod write_handler;

pub use aes::{aes128_decrypt, aes128_encrypt};
pub use algorithms::{compute_encryption_key, compute_owner_hash, compute_user_hash, PADDING};
pub use rc4::rc4_crypt;
pub use write_handler::EncryptionWriteHandler;

/// Encryption algorithm written into the `/Encrypt` dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// RC4 with 40-bit key (V=1, R=2)
    #[default]
    Rc4_40,
    /// RC4 with 128-bit key (V=2, R=3)
    Rc4_128,
    /// AES with 128-bit key in CBC mode (V=4, R=4)
    Aes128,
}

impl Algorithm {
    /// Key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 | Algorithm::Aes128 => 16,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128)
    }

    /// (V, R) pair for the encryption dictionary.
    pub fn version_revision(&self) -> (i64, u32) {
        match self {
            Algorithm::Rc4_40 => (1, 2),
            Algorithm::Rc4_128 => (2, 3),
            Algorithm::Aes128 => (4, 4),
        }
    }
}

bitflags! {
    /// User access permissions (ISO 32000-1, Table 22).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Permissions: u32 {
        /// Bit 3: print the document
        const PRINT = 1 << 2;
        /// Bit 4: modify contents
        const MODIFY = 1 << 3;
        /// Bit 5: copy or extract text and graphics
        const COPY = 1 << 4;
        /// Bit 6: add or modify annotations
        const ANNOTATE = 1 << 5;
        /// Bit 9: fill in form fields (R>=3)
        const FILL_FORMS = 1 << 8;
        /// Bit 10: extract for accessibility (R>=3)
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        /// Bit 11: assemble the document (R>=3)
        const ASSEMBLE = 1 << 10;
        /// Bit 12: high quality print (R>=3)
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Bits a caller may set for revision 2.
const R2_MASK: u32 = 0x3C;
/// Bits a caller may set for revision 3 and 4.
const R3_MASK: u32 = 0xF3C;

/// Compute the signed `/P` value for `bits`.
///
/// Reserved bits 1-2 must be clear; for revision 2 only bits 3-6 may be set.
/// All bits above the revision's range are forced on, so `0` at revision 2
/// gives `-64`.
pub fn permission_value(bits: u32, revision: u32) -> Result<i32> {
    let (mask, forced) = if revision >= 3 {
        (R3_MASK, 0xFFFF_F0C0u32)
    } else {
        (R2_MASK, 0xFFFF_FFC0u32)
    };
    if bits & !mask != 0 {
        return Err(Error::Protection(format!(
            "permission bits {:#x} outside allowed mask {:#x} for revision {}",
            bits, mask, revision
        )));
    }
    Ok((forced | bits) as i32)
}

/// Requested protection: permissions, passwords and algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionConfig {
    /// Raw permission bits (see [`Permissions`])
    pub permissions: u32,
    /// Password needed to open the document (may be empty)
    pub user_password: Vec<u8>,
    /// Password granting full access; empty falls back to the user password
    pub owner_password: Vec<u8>,
    /// Algorithm and revision
    pub algorithm: Algorithm,
}

impl ProtectionConfig {
    /// RC4-40 protection with the given permissions and passwords.
    pub fn new(permissions: u32, user_password: &[u8], owner_password: &[u8]) -> Self {
        Self {
            permissions,
            user_password: user_password.to_vec(),
            owner_password: owner_password.to_vec(),
            algorithm: Algorithm::default(),
        }
    }

    /// Choose the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// Derived security state: `/O`, `/U`, `/P` and the document key.
#[derive(Debug, Clone)]
pub struct StandardSecurity {
    algorithm: Algorithm,
    owner_hash: Vec<u8>,
    user_hash: Vec<u8>,
    permissions: i32,
    key: Vec<u8>,
}

impl StandardSecurity {
    /// Validate `config` and derive all values.
    pub fn new(config: &ProtectionConfig) -> Result<Self> {
        for (label, password) in [
            ("user", &config.user_password),
            ("owner", &config.owner_password),
        ] {
            if password.len() > 32 {
                return Err(Error::Protection(format!(
                    "{} password longer than 32 bytes",
                    label
                )));
            }
        }

        let algorithm = config.algorithm;
        let (_, revision) = algorithm.version_revision();
        let key_len = algorithm.key_length();
        let permissions = permission_value(config.permissions, revision)?;

        let owner_hash = compute_owner_hash(
            &config.owner_password,
            &config.user_password,
            revision,
            key_len,
        );
        let key = compute_encryption_key(
            &config.user_password,
            &owner_hash,
            permissions,
            b"",
            revision,
            key_len,
            true,
        );
        let user_hash = compute_user_hash(&key, b"", revision);

        log::debug!(
            "Derived {:?} security handler (R={}, P={})",
            algorithm,
            revision,
            permissions
        );
        Ok(Self {
            algorithm,
            owner_hash,
            user_hash,
            permissions,
            key,
        })
    }

    /// The signed `/P` value.
    pub fn permissions(&self) -> i32 {
        self.permissions
    }

    /// The algorithm in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The document encryption key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Handler that encrypts object strings and streams with this key.
    pub fn write_handler(&self) -> EncryptionWriteHandler {
        EncryptionWriteHandler::from_key(self.key.clone(), self.algorithm)
    }

    /// The `/Encrypt` dictionary.
    pub fn encrypt_dict(&self) -> Object {
        let (version, revision) = self.algorithm.version_revision();
        let mut dict = Dict::new();
        dict.insert("Filter".into(), Object::name("Standard"));
        dict.insert("V".into(), Object::Integer(version));
        dict.insert("R".into(), Object::Integer(revision as i64));
        if version >= 2 {
            dict.insert(
                "Length".into(),
                Object::Integer(self.algorithm.key_length() as i64 * 8),
            );
        }
        dict.insert("O".into(), Object::String(self.owner_hash.clone()));
        dict.insert("U".into(), Object::String(self.user_hash.clone()));
        dict.insert("P".into(), Object::Integer(self.permissions as i64));

        if self.algorithm.is_aes() {
            let mut std_cf = Dict::new();
            std_cf.insert("Type".into(), Object::name("CryptFilter"));
            std_cf.insert("CFM".into(), Object::name("AESV2"));
            std_cf.insert("AuthEvent".into(), Object::name("DocOpen"));
            std_cf.insert("Length".into(), Object::Integer(16));
            let mut cf = Dict::new();
            cf.insert("StdCF".into(), Object::Dictionary(std_cf));
            dict.insert("CF".into(), Object::Dictionary(cf));
            dict.insert("StmF".into(), Object::name("StdCF"));
            dict.insert("StrF".into(), Object::name("StdCF"));
        }

        Object::Dictionary(dict)
    }
}
