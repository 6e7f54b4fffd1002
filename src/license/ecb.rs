//! Legacy AES-ECB block decryption
//!
//! **Security Warning**: ECB decrypts every block independently with no IV, no
//! chaining and no authentication. It leaks plaintext structure and offers no
//! integrity. It exists only because content protected under end-user
//! licenses uses it (`MICROSOFT.ECB`), and it must stay bit-for-bit
//! compatible with that format. Do not use it for anything else; it is
//! deliberately not exported from the crate.

use crate::error::{Error, Result};
use aes::cipher::{BlockDecrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use tracing::warn;

/// AES block size in bytes, independent of key length
pub(crate) const BLOCK_SIZE: usize = 16;

enum Cipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// AES key schedule used for format-compatibility ECB decryption only
pub(crate) struct LegacyEcb {
    cipher: Cipher,
}

impl LegacyEcb {
    /// Build the key schedule; the key must be 16, 24 or 32 bytes
    pub(crate) fn new(key: &[u8]) -> Result<Self> {
        let invalid = |_| Error::KeyMaterial(format!("invalid AES key size {}", key.len()));
        let cipher = match key.len() {
            16 => Cipher::Aes128(Aes128::new_from_slice(key).map_err(invalid)?),
            24 => Cipher::Aes192(Aes192::new_from_slice(key).map_err(invalid)?),
            32 => Cipher::Aes256(Aes256::new_from_slice(key).map_err(invalid)?),
            n => {
                return Err(Error::KeyMaterial(format!(
                    "invalid AES key size {}, expected 16, 24 or 32 bytes",
                    n
                )));
            }
        };
        Ok(Self { cipher })
    }

    /// Block size of the cipher
    pub(crate) fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Decrypt each block independently
    ///
    /// Leading bytes that make the input length a non-multiple of the block
    /// size are dropped before decrypting, so the output is always
    /// `len - len % 16` bytes. Whether that prefix is really junk is
    /// unconfirmed; the behavior is kept for compatibility with existing
    /// decrypted output. No padding is removed.
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        let skip = ciphertext.len() % BLOCK_SIZE;
        if skip > 0 {
            warn!(
                discarded = skip,
                length = ciphertext.len(),
                "ciphertext is not block aligned, dropping leading bytes"
            );
        }

        let mut out = ciphertext[skip..].to_vec();
        for chunk in out.chunks_exact_mut(BLOCK_SIZE) {
            let block = Block::from_mut_slice(chunk);
            match &self.cipher {
                Cipher::Aes128(c) => c.decrypt_block(block),
                Cipher::Aes192(c) => c.decrypt_block(block),
                Cipher::Aes256(c) => c.decrypt_block(block),
            }
        }
        out
    }
}
