//! Service-account authentication (OAuth 2.0 JWT bearer grant)

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/spreadsheets",
];

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Longest token lifetime we trust from the token endpoint
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read service account key {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid service account key {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unusable private key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("token exchange failed: {0}")]
    Exchange(String),
}

// === Key File & Wire Types ===

/// The fields of a service-account JSON key that the grant needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

// === Tokens ===

/// `expires_in` as reported, capped at [`MAX_TOKEN_LIFETIME`]
fn token_lifetime(expires_in: Option<u64>) -> Duration {
    expires_in
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(ASSERTION_LIFETIME_SECS as u64))
        .min(MAX_TOKEN_LIFETIME)
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    /// Usable for at least another minute
    pub fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

// === Service Account ===

pub struct ServiceAccount {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
}

impl ServiceAccount {
    /// Load and check a JSON key file
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let contents = fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let key: ServiceAccountKey =
            serde_json::from_str(&contents).map_err(|source| CredentialError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;

        tracing::debug!("Loaded service account {}", key.client_email);
        Ok(Self { key, encoding_key })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self) -> Result<String, CredentialError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: self.key.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Trade a signed assertion for a bearer token
    pub async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, CredentialError> {
        let assertion = self.assertion()?;
        let requested_at = Instant::now();

        let response = client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Exchange(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialError::Exchange(format!("bad token response: {}", e)))?;

        let lifetime = token_lifetime(token.expires_in);
        tracing::info!(
            "Authenticated as {} (token valid for {})",
            self.key.client_email,
            crate::shared::format_duration(lifetime)
        );
        Ok(AccessToken {
            value: token.access_token,
            expires_at: requested_at.checked_add(lifetime).ok_or_else(|| {
                CredentialError::Exchange(format!("token lifetime {:?} out of range", lifetime))
            })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("w1-key-{}-{}.json", name, std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_key_file() {
        let path = Path::new("/nonexistent/w1-temp-reporter/key.json");
        assert!(matches!(
            ServiceAccount::from_file(path),
            Err(CredentialError::Read { .. })
        ));
    }

    #[test]
    fn test_key_file_not_json() {
        let path = write_temp("garbage", "definitely not json");
        assert!(matches!(
            ServiceAccount::from_file(&path),
            Err(CredentialError::Parse { .. })
        ));
    }

    #[test]
    fn test_key_file_bad_pem() {
        let path = write_temp(
            "badpem",
            r#"{"client_email": "svc@example.iam.gserviceaccount.com", "private_key": "nope"}"#,
        );
        assert!(matches!(
            ServiceAccount::from_file(&path),
            Err(CredentialError::Key(_))
        ));
    }

    #[test]
    fn test_assertion_claims() {
        let key = serde_json::json!({
            "client_email": "svc@example.iam.gserviceaccount.com",
            "private_key": include_str!("testdata/test_key.pem"),
            "private_key_id": "abc123",
        });
        let path = write_temp("claims", &key.to_string());
        let account = ServiceAccount::from_file(&path).unwrap();
        assert_eq!(account.client_email(), "svc@example.iam.gserviceaccount.com");

        let assertion = account.assertion().unwrap();
        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("abc123"));

        let mut validation = jsonwebtoken::Validation::new(Algorithm::RS256);
        validation.set_audience(&[GOOGLE_TOKEN_URI]);
        let decoding_key =
            jsonwebtoken::DecodingKey::from_rsa_pem(include_bytes!("testdata/test_key.pub.pem")).unwrap();
        let claims = jsonwebtoken::decode::<Claims>(&assertion, &decoding_key, &validation)
            .unwrap()
            .claims;

        assert_eq!(claims.iss, "svc@example.iam.gserviceaccount.com");
        assert_eq!(claims.scope, SCOPES.join(" "));
        assert_eq!(claims.exp - claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_token_lifetime_is_capped() {
        assert_eq!(token_lifetime(None), Duration::from_secs(3600));
        assert_eq!(token_lifetime(Some(1800)), Duration::from_secs(1800));
        assert_eq!(token_lifetime(Some(u64::MAX)), MAX_TOKEN_LIFETIME);
    }

    #[test]
    fn test_token_freshness() {
        let fresh = AccessToken {
            value: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        let stale = AccessToken {
            value: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(fresh.is_fresh());
        assert!(!stale.is_fresh());
    }
}
