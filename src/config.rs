//! Provider-level configuration.
//!
//! The host hands the provider block over as JSON. Anything left unset there
//! is filled from the environment:
//!
//! | attribute | environment variable |
//! |---|---|
//! | `endpoint` | `YC_ENDPOINT` |
//! | `token` | `YC_TOKEN` |
//! | `iam_token` | `YC_IAM_TOKEN` |
//! | `service_account_key_file` | `YC_SERVICE_ACCOUNT_KEY_FILE` |
//! | `cloud_id` | `YC_CLOUD_ID` |
//! | `folder_id` | `YC_FOLDER_ID` |

use std::fmt;

use serde::Deserialize;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::null_as_default;

/// The production API endpoint.
pub const DEFAULT_ENDPOINT: &str = "api.cloud.yandex.net:443";

/// Provider block as declared by the host, after environment layering.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API endpoint, `host:port`.
    pub endpoint: Option<String>,
    /// OAuth token.
    pub token: Option<String>,
    /// Ready-made IAM token.
    pub iam_token: Option<String>,
    /// Path to a service account key in JSON form, or the JSON itself.
    pub service_account_key_file: Option<String>,
    /// Default cloud.
    pub cloud_id: Option<String>,
    /// Default folder for resources that do not declare one.
    pub folder_id: Option<String>,
    /// Talk to the endpoint without TLS (local emulators only).
    #[serde(deserialize_with = "null_as_default")]
    pub plaintext: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &redacted(&self.token))
            .field("iam_token", &redacted(&self.iam_token))
            .field("service_account_key_file", &self.service_account_key_file)
            .field("cloud_id", &self.cloud_id)
            .field("folder_id", &self.folder_id)
            .field("plaintext", &self.plaintext)
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the provider block. `null` is treated as an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider block: {}", e)))
    }

    /// Fill unset attributes from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Fill unset attributes using `lookup` as the environment.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.as_deref().map_or(true, str::is_empty) {
                *slot = lookup(key).filter(|v| !v.is_empty());
            }
        };
        fill(&mut self.endpoint, "YC_ENDPOINT");
        fill(&mut self.token, "YC_TOKEN");
        fill(&mut self.iam_token, "YC_IAM_TOKEN");
        fill(
            &mut self.service_account_key_file,
            "YC_SERVICE_ACCOUNT_KEY_FILE",
        );
        fill(&mut self.cloud_id, "YC_CLOUD_ID");
        fill(&mut self.folder_id, "YC_FOLDER_ID");
        self
    }

    /// The configured endpoint, or the production one.
    pub fn endpoint(&self) -> &str {
        non_empty(&self.endpoint).unwrap_or(DEFAULT_ENDPOINT)
    }

    /// The default folder, if any.
    pub fn folder_id(&self) -> Option<&str> {
        non_empty(&self.folder_id)
    }

    /// Pick credentials: OAuth token, then IAM token, then service account key.
    pub fn credentials(&self) -> Result<Credentials, ProviderError> {
        if let Some(token) = non_empty(&self.token) {
            return Ok(Credentials::OAuthToken(token.to_string()));
        }
        if let Some(token) = non_empty(&self.iam_token) {
            return Ok(Credentials::IamToken(token.to_string()));
        }
        if let Some(key) = non_empty(&self.service_account_key_file) {
            return ServiceAccountKey::load(key).map(Credentials::ServiceAccountKey);
        }
        Err(ProviderError::Auth(
            "one of 'token', 'iam_token' or 'service_account_key_file' must be set".to_string(),
        ))
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "endpoint",
                Attribute::optional_string()
                    .with_description("API endpoint")
                    .with_default(serde_json::json!(DEFAULT_ENDPOINT)),
            )
            .with_attribute(
                "token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("OAuth token"),
            )
            .with_attribute(
                "iam_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("IAM token"),
            )
            .with_attribute(
                "service_account_key_file",
                Attribute::optional_string()
                    .with_description("Path to a service account key file, or its JSON contents"),
            )
            .with_attribute(
                "cloud_id",
                Attribute::optional_string().with_description("Default cloud ID"),
            )
            .with_attribute(
                "folder_id",
                Attribute::optional_string().with_description("Default folder ID"),
            )
            .with_attribute(
                "plaintext",
                Attribute::optional_bool().with_description("Disable TLS"),
            )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Authentication material, in the order it is looked up.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// OAuth token, exchanged for an IAM token.
    OAuthToken(String),
    /// IAM token, sent as is.
    IamToken(String),
    /// Authorized key of a service account, exchanged for an IAM token via a signed JWT.
    ServiceAccountKey(ServiceAccountKey),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuthToken(_) => f.write_str("OAuthToken(<redacted>)"),
            Self::IamToken(_) => f.write_str("IamToken(<redacted>)"),
            Self::ServiceAccountKey(key) => f
                .debug_struct("ServiceAccountKey")
                .field("id", &key.id)
                .field("service_account_id", &key.service_account_id)
                .finish_non_exhaustive(),
        }
    }
}

/// An authorized key as downloaded from the console or `yc iam key create`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    /// Key id, sent as the JWT `kid`.
    pub id: String,
    /// Owning service account, sent as the JWT issuer.
    pub service_account_id: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("id", &self.id)
            .field("service_account_id", &self.service_account_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Load a key from a file path or from inline JSON.
    pub fn load(path_or_contents: &str) -> Result<Self, ProviderError> {
        let contents = if path_or_contents.trim_start().starts_with('{') {
            path_or_contents.to_string()
        } else {
            std::fs::read_to_string(path_or_contents).map_err(|e| {
                ProviderError::Configuration(format!(
                    "cannot read service account key file {}: {}",
                    path_or_contents, e
                ))
            })?
        };
        Self::parse(&contents)
    }

    /// Parse the JSON form of a key.
    pub fn parse(contents: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(contents).map_err(|e| {
            ProviderError::Configuration(format!("invalid service account key: {}", e))
        })
    }
}
