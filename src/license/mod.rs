//! End-user licenses and content keys
//!
//! An end-user license is the JSON document the licensing service returns in
//! exchange for a publishing license. Its [`Key`] decrypts the protected
//! content.
//!
//! # Example
//!
//! ```no_run
//! use librms::EndUserLicense;
//! use std::fs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let license = EndUserLicense::from_slice(&fs::read("user.license")?)?;
//! let plaintext = license.decrypt(&fs::read("content.encrypted")?)?;
//! fs::write("decrypted.compound", plaintext)?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "crypto")]
mod ecb;
mod key;

pub use key::{Key, SUPPORTED_ALGORITHM, SUPPORTED_CIPHER_MODE};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

/// Marker at the start of a publishing license document
pub const XML_PROLOGUE: &[u8] = b"<?xml";

/// Users granted a set of rights
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserRight {
    /// Principals, usually email addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Rights held by the users
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rights: Vec<String>,
}

/// Usage policy attached to a license
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Whether audited extraction of the content is allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_audited_extraction: Option<bool>,
    /// Roles granted to users
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_roles: Vec<String>,
    /// Rights granted per user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_rights: Vec<UserRight>,
    /// Days between online license checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_time_in_days: Option<i64>,
    /// Expiry of the license
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_valid_until: Option<String>,
}

/// License issued to a single user for one piece of protected content
///
/// All fields are optional; unknown fields are ignored. The application data
/// maps keep their values as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndUserLicense {
    /// License identifier
    #[serde(default, rename = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Template or policy name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Template or policy description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where the user can request access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// Owner of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Access decision for the requesting user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_status: Option<String>,
    /// Content key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    /// Rights held by the requesting user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rights: Vec<String>,
    /// Roles held by the requesting user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// User the license was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_to: Option<String>,
    /// Expiry of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_valid_until: Option<String>,
    /// Expiry of the license
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_valid_until: Option<String>,
    /// Identifier of the protected content
    #[serde(default, rename = "ContentId", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Document identifier
    #[serde(default, rename = "DocumentId", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Sensitivity label identifier
    #[serde(default, rename = "LabelId", skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    /// Whether the content may only be opened online
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_access_only: Option<bool>,
    /// Signed application-specific data
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub signed_application_data: BTreeMap<String, Value>,
    /// Encrypted application-specific data
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub encrypted_application_data: BTreeMap<String, Value>,
    /// Whether the protection came from a template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_template: Option<bool>,
    /// Usage policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
    /// Set by the service when the request was refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EndUserLicense {
    /// Parse a license from a JSON reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Parse a license from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize back to indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decrypt protected content with the license's key
    ///
    /// See [`Key::decrypt`] for the checks performed.
    #[cfg(feature = "crypto")]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.key
            .as_ref()
            .ok_or(Error::MissingField("Key"))?
            .decrypt(ciphertext)
    }
}

impl fmt::Display for EndUserLicense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Locate the publishing license inside a `content.license` file
///
/// Extracted license files sometimes carry bytes before the XML document;
/// everything before the first `<?xml` is skipped.
///
/// # Errors
///
/// [`Error::InvalidLicense`] if the data contains no XML prologue.
///
/// # Example
///
/// ```
/// let data = b"\x00\x01junk<?xml version=\"1.0\"?><XrML/>";
/// let license = librms::license::publishing_license(data).unwrap();
/// assert!(license.starts_with(b"<?xml"));
/// ```
pub fn publishing_license(data: &[u8]) -> Result<&[u8]> {
    data.windows(XML_PROLOGUE.len())
        .position(|window| window == XML_PROLOGUE)
        .map(|start| &data[start..])
        .ok_or_else(|| Error::InvalidLicense("license does not have an XML prologue".to_string()))
}
