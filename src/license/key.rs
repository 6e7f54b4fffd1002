//! Content key descriptor

use serde::{Deserialize, Serialize};

#[cfg(feature = "crypto")]
use crate::error::{Error, Result};

/// The only supported key algorithm
pub const SUPPORTED_ALGORITHM: &str = "AES";

/// The only supported cipher mode, the licensing service's label for ECB
pub const SUPPORTED_CIPHER_MODE: &str = "MICROSOFT.ECB";

/// Symmetric content key from an end-user license
///
/// Every field may be absent in the JSON document; all of them are required
/// to decrypt.
///
/// ```json
/// { "Value": "AAECAwQFBgcICQoLDA0ODw==", "CipherMode": "MICROSOFT.ECB", "Algorithm": "AES", "Size": 16 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Key {
    /// Base64-encoded key bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Cipher mode label, `MICROSOFT.ECB`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_mode: Option<String>,
    /// Algorithm name, `AES`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Declared size, compared against the cipher block size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[cfg(feature = "crypto")]
impl Key {
    /// Decrypt content protected with this key
    ///
    /// Checks, in order: the algorithm is `AES`, the cipher mode is
    /// `MICROSOFT.ECB`, the value is valid base64 of an AES key, and the
    /// declared size equals the AES block size (16). Then every 16-byte block
    /// is decrypted on its own (ECB).
    ///
    /// Two properties of the format are kept as-is:
    /// - if the ciphertext length is not a multiple of 16, the leading
    ///   `len % 16` bytes are dropped rather than rejected
    /// - no padding is stripped, the output length is always a multiple of 16
    ///
    /// # Example
    ///
    /// ```
    /// use librms::Key;
    ///
    /// # fn main() -> librms::Result<()> {
    /// let key = Key {
    ///     value: Some("AAECAwQFBgcICQoLDA0ODw==".to_string()),
    ///     cipher_mode: Some("MICROSOFT.ECB".to_string()),
    ///     algorithm: Some("AES".to_string()),
    ///     size: Some(16),
    /// };
    /// let plaintext = key.decrypt(&[0u8; 32])?;
    /// assert_eq!(plaintext.len(), 32);
    /// # Ok(())
    /// # }
    /// ```
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        use super::ecb::LegacyEcb;
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

        let algorithm = self.algorithm.as_deref().ok_or(Error::MissingField("Algorithm"))?;
        if algorithm != SUPPORTED_ALGORITHM {
            return Err(Error::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let cipher_mode = self.cipher_mode.as_deref().ok_or(Error::MissingField("CipherMode"))?;
        if cipher_mode != SUPPORTED_CIPHER_MODE {
            return Err(Error::UnsupportedCipherMode(cipher_mode.to_string()));
        }

        let value = self.value.as_deref().ok_or(Error::MissingField("Value"))?;
        let key_bytes = BASE64
            .decode(value)
            .map_err(|e| Error::KeyMaterial(format!("failed to base64 decode Value: {}", e)))?;

        let cipher = LegacyEcb::new(&key_bytes)?;

        let size = self.size.ok_or(Error::MissingField("Size"))?;
        let block_size = cipher.block_size();
        if usize::try_from(size).ok() != Some(block_size) {
            return Err(Error::KeyMaterial(format!(
                "mismatched block size {} and {}",
                size, block_size
            )));
        }

        Ok(cipher.decrypt(ciphertext))
    }
}
