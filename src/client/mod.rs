//! Licensing service client
//!
//! A small blocking client for the Azure RMS licensing endpoints. Every
//! request carries the headers the service expects: the caller's platform id,
//! a user agent, a fresh request id and a bearer access token.
//!
//! # Example
//!
//! ```no_run
//! use librms::client::{Client, ClientConfig};
//! use librms::license::publishing_license;
//!
//! # fn main() -> librms::Result<()> {
//! let client = Client::new(ClientConfig::new().with_access_token("eyJ0eXAi..."))?;
//! let content = std::fs::read("content.license")?;
//! let (license, raw) = client.end_user_license(publishing_license(&content)?)?;
//! println!("{}", license);
//! std::fs::write("user.license", raw)?;
//! # Ok(())
//! # }
//! ```

mod templates;

pub use reqwest::Certificate;
pub use templates::Template;

use crate::error::{Error, Result};
use crate::license::EndUserLicense;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::blocking::{RequestBuilder, Response};
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Production licensing service
pub const DEFAULT_BASE_URL: &str = "https://api.aadrm.com";

/// User agent of the desktop mail client the service is used to seeing
pub const DEFAULT_USER_AGENT: &str =
    "Outlook/16.35.20030802 CFNetwork/1121.1.2 Darwin/19.3.0 (x86_64)";

/// Platform descriptor matching [`DEFAULT_USER_AGENT`]
pub const DEFAULT_PLATFORM_ID: &str = "AppName=com.microsoft.Outlook;AppVersion=16.35;DevicePlatform=Mac;OSVersion=10.15.3;SDKVersion=4.2.21;ClientID=00000000-0000-0000-0000-000000000000";

/// Header identifying the calling application
pub const PLATFORM_ID_HEADER: &str = "X-MS-RMS-Platform-Id";

/// Header carrying a per-request UUID
pub const REQUEST_ID_HEADER: &str = "X-MS-RMS-Request-Id";

const END_USER_LICENSE_PATH: &str = "/my/v2/enduserlicenses";

/// Client configuration
///
/// Empty user agent and platform id values are not sent.
///
/// Server certificates are checked against the built-in web PKI roots plus any
/// [`with_root_certificates`](Self::with_root_certificates). Disabling the
/// built-in roots pins the client to the configured certificates only.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    user_agent: String,
    platform_id: String,
    access_token: Option<String>,
    root_certificates: Vec<Certificate>,
    built_in_roots: bool,
    accept_invalid_certs: bool,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Default configuration against the production service, without a token
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            platform_id: DEFAULT_PLATFORM_ID.to_string(),
            access_token: None,
            root_certificates: Vec::new(),
            built_in_roots: true,
            accept_invalid_certs: false,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Use a different service root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the `User-Agent` header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the `X-MS-RMS-Platform-Id` header
    pub fn with_platform_id(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = platform_id.into();
        self
    }

    /// Set the OAuth access token; surrounding whitespace is trimmed
    pub fn with_access_token(mut self, token: impl AsRef<str>) -> Self {
        self.access_token = Some(token.as_ref().trim().to_string());
        self
    }

    /// Trust these root certificates in addition to (or instead of) the
    /// built-in roots
    pub fn with_root_certificates(mut self, certificates: Vec<Certificate>) -> Self {
        self.root_certificates = certificates;
        self
    }

    /// Add one trusted root certificate
    pub fn with_root_certificate(mut self, certificate: Certificate) -> Self {
        self.root_certificates.push(certificate);
        self
    }

    /// Whether the built-in web PKI roots are trusted (default true)
    pub fn with_built_in_roots(mut self, enabled: bool) -> Self {
        self.built_in_roots = enabled;
        self
    }

    /// Disable TLS certificate verification
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set the per-request timeout, `None` for no timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Service root
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `User-Agent` header value
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// `X-MS-RMS-Platform-Id` header value
    pub fn platform_id(&self) -> &str {
        &self.platform_id
    }

    /// Extra trusted root certificates
    pub fn root_certificates(&self) -> &[Certificate] {
        &self.root_certificates
    }

    /// Whether the built-in roots are trusted
    pub fn built_in_roots(&self) -> bool {
        self.built_in_roots
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EndUserLicenseRequest {
    serialized_publishing_license: String,
}

/// Blocking licensing service client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::blocking::Client,
    config: ClientConfig,
}

impl Client {
    /// Build a client from a configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .tls_built_in_root_certs(config.built_in_roots)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        for certificate in &config.root_certificates {
            builder = builder.add_root_certificate(certificate.clone());
        }
        debug!(
            extra_roots = config.root_certificates.len(),
            built_in_roots = config.built_in_roots,
            "building licensing service client"
        );
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    /// Configuration the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a request against `path` with the service headers set
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let request_id = Uuid::new_v4();
        debug!(%method, %url, %request_id, "licensing service request");

        let mut builder = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if !self.config.platform_id.is_empty() {
            builder = builder.header(PLATFORM_ID_HEADER, &self.config.platform_id);
        }
        if !self.config.user_agent.is_empty() {
            builder = builder.header(reqwest::header::USER_AGENT, &self.config.user_agent);
        }
        if let Some(token) = &self.config.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Exchange a publishing license for an end-user license
    ///
    /// Returns the parsed license together with the raw response body, which
    /// is what gets stored as `user.license`.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] on transport failures and non-success statuses,
    /// [`Error::Json`] if the body is not a license document.
    pub fn end_user_license(&self, publishing_license: &[u8]) -> Result<(EndUserLicense, Vec<u8>)> {
        let body = EndUserLicenseRequest {
            serialized_publishing_license: BASE64.encode(publishing_license),
        };
        let response = self
            .request(Method::POST, END_USER_LICENSE_PATH)
            .json(&body)
            .send()?;
        let raw = checked(response)?.bytes()?.to_vec();
        let license = EndUserLicense::from_slice(&raw)?;
        Ok((license, raw))
    }
}

/// Turn a non-success response into [`Error::Http`]
///
/// The service reports refusals as a license document with an
/// `ErrorMessage`; that message is preferred over the raw body.
fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let detail = serde_json::from_str::<EndUserLicense>(&body)
        .ok()
        .and_then(|license| license.error_message)
        .unwrap_or(body);
    Err(Error::Http(format!("{}: {}", status, detail.trim())))
}
