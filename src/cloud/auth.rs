//! IAM token acquisition.
//!
//! Every API call carries an IAM token. An IAM token from the configuration
//! is used verbatim; OAuth tokens and service account keys are exchanged for
//! one through `IamTokenService/Create`, and the result is cached until
//! shortly before it expires.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tonic::Status;
use tracing::{debug, info};

use super::grpc::unary;
use super::proto::iam::{create_iam_token_request, CreateIamTokenRequest, CreateIamTokenResponse};
use crate::config::{Credentials, ServiceAccountKey};
use crate::operation::Deadline;

const CREATE_IAM_TOKEN: &str = "/yandex.cloud.iam.v1.IamTokenService/Create";

/// Audience the IAM token service expects in service account JWTs.
pub const JWT_AUDIENCE: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

/// Lifetime of the JWTs signed with a service account key.
const JWT_LIFETIME_SECS: i64 = 3600;

/// How long before expiry a cached token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Used when the token service omits `expires_at`.
const FALLBACK_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

/// Produces IAM tokens for outgoing calls.
pub struct TokenSource {
    credentials: Credentials,
    iam: Channel,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Create a token source exchanging credentials over the given IAM channel.
    pub fn new(credentials: Credentials, iam: Channel) -> Self {
        Self {
            credentials,
            iam,
            cached: Mutex::new(None),
        }
    }

    /// A valid IAM token, exchanging credentials if the cached one is stale.
    pub async fn token(&self, ctx: &Deadline) -> Result<String, Status> {
        if let Credentials::IamToken(token) = &self.credentials {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let identity = match &self.credentials {
            Credentials::IamToken(token) => return Ok(token.clone()),
            Credentials::OAuthToken(token) => {
                create_iam_token_request::Identity::YandexPassportOauthToken(token.clone())
            }
            Credentials::ServiceAccountKey(key) => {
                create_iam_token_request::Identity::Jwt(sign_jwt(key, Utc::now())?)
            }
        };

        debug!("exchanging credentials for an IAM token");
        let mut request = tonic::Request::new(CreateIamTokenRequest {
            identity: Some(identity),
        });
        request.set_timeout(ctx.remaining());
        let response: CreateIamTokenResponse = unary(self.iam.clone(), CREATE_IAM_TOKEN, request)
            .await
            .map_err(exchange_error)?;

        let refresh_at = refresh_time(&response, Utc::now());
        info!(refresh_at = %refresh_at, "obtained IAM token");
        *cached = Some(CachedToken {
            token: response.iam_token.clone(),
            refresh_at,
        });
        Ok(response.iam_token)
    }
}

/// Keep the status code of a failed exchange unless the credentials were rejected.
///
/// Transient failures of the token service stay retryable.
fn exchange_error(status: Status) -> Status {
    let message = format!("failed to obtain IAM token: {}", status.message());
    match status.code() {
        tonic::Code::Unauthenticated
        | tonic::Code::PermissionDenied
        | tonic::Code::InvalidArgument => Status::unauthenticated(message),
        code => Status::new(code, message),
    }
}

fn refresh_time(response: &CreateIamTokenResponse, now: DateTime<Utc>) -> DateTime<Utc> {
    let expires_at = response
        .expires_at
        .as_ref()
        .and_then(|ts| DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32))
        .unwrap_or_else(|| now + ChronoDuration::seconds(FALLBACK_TOKEN_LIFETIME_SECS));
    expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECS)
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign a PS256 JWT for the IAM token exchange.
pub fn sign_jwt(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, Status> {
    let iat = now.timestamp();
    let claims = JwtClaims {
        iss: &key.service_account_id,
        aud: JWT_AUDIENCE,
        iat,
        exp: iat + JWT_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        Status::unauthenticated(format!("bad service account private key {}: {}", key.id, e))
    })?;

    let mut header = Header::new(Algorithm::PS256);
    header.kid = Some(key.id.clone());
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| Status::unauthenticated(format!("JWT encode: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_private_key_is_unauthenticated() {
        let key = ServiceAccountKey {
            id: "key-1".to_string(),
            service_account_id: "sa-1".to_string(),
            private_key: "not a pem".to_string(),
        };

        let status = sign_jwt(&key, Utc::now()).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert!(status.message().contains("key-1"));
    }

    #[test]
    fn test_rejected_credentials_are_unauthenticated() {
        for status in [
            Status::unauthenticated("bad token"),
            Status::permission_denied("disabled"),
            Status::invalid_argument("malformed jwt"),
        ] {
            let mapped = exchange_error(status);
            assert_eq!(mapped.code(), tonic::Code::Unauthenticated);
            assert!(mapped.message().starts_with("failed to obtain IAM token"));
        }
    }

    #[test]
    fn test_transient_exchange_failures_keep_their_code() {
        for code in [
            tonic::Code::Unavailable,
            tonic::Code::DeadlineExceeded,
            tonic::Code::Internal,
            tonic::Code::ResourceExhausted,
        ] {
            let mapped = exchange_error(Status::new(code, "iam down"));
            assert_eq!(mapped.code(), code);
            assert!(mapped.message().contains("iam down"));

            let err = crate::error::ProviderError::from(mapped);
            assert!(!err.is_fatal(), "{:?} must stay retryable", code);
        }
    }

    #[test]
    fn test_refresh_before_expiry() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        let response = CreateIamTokenResponse {
            iam_token: "t1".to_string(),
            expires_at: Some(prost_types::Timestamp {
                seconds: 1_000_000 + 12 * 3600,
                nanos: 0,
            }),
        };

        let refresh_at = refresh_time(&response, now);
        assert_eq!(
            refresh_at.timestamp(),
            1_000_000 + 12 * 3600 - REFRESH_MARGIN_SECS
        );
    }

    #[test]
    fn test_missing_expiry_uses_fallback() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        let response = CreateIamTokenResponse {
            iam_token: "t1".to_string(),
            expires_at: None,
        };

        let refresh_at = refresh_time(&response, now);
        assert_eq!(
            refresh_at.timestamp(),
            1_000_000 + FALLBACK_TOKEN_LIFETIME_SECS - REFRESH_MARGIN_SECS
        );
    }
}
