use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::env;

pub const DEFAULT_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS_JSON_B64";

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("missing credentials: environment variable {0} is not set")]
    Missing(String),
    #[error("credentials are not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("credentials are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("credentials are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credentials are missing the `{0}` field")]
    MissingField(&'static str),
    #[error("credentials were rejected: {0}")]
    Auth(String),
}

/// A decoded service account key.
///
/// The full JSON document is kept so the auth library sees every field, with
/// `private_key` already unescaped.
#[derive(Clone, Debug)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    document: Value,
}

impl ServiceAccountKey {
    pub fn into_json(self) -> Value {
        self.document
    }
}

/// Decodes a base64-encoded service account JSON document.
///
/// Keys stored in environment variables often carry the two characters `\n`
/// instead of real newlines; those are unescaped here.
pub fn decode_service_account(b64: &str) -> Result<ServiceAccountKey, CredentialError> {
    let bytes = STANDARD.decode(b64.trim())?;
    let json = String::from_utf8(bytes)?;
    let mut document: Value = serde_json::from_str(&json)?;

    let client_email = document
        .get("client_email")
        .and_then(Value::as_str)
        .ok_or(CredentialError::MissingField("client_email"))?
        .to_string();

    let private_key = document
        .get("private_key")
        .and_then(Value::as_str)
        .ok_or(CredentialError::MissingField("private_key"))?
        .replace("\\n", "\n");

    document["private_key"] = Value::String(private_key.clone());

    Ok(ServiceAccountKey {
        client_email,
        private_key,
        document,
    })
}

/// Where the encoded service account key comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum CredentialSource {
    /// Read from an environment variable on every load, so a rotated key is
    /// picked up without a restart.
    Env { var: String },
    Inline { b64: String },
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Env {
            var: DEFAULT_CREDENTIALS_ENV.to_string(),
        }
    }
}

impl CredentialSource {
    pub fn load(&self) -> Result<ServiceAccountKey, CredentialError> {
        match self {
            CredentialSource::Env { var } => {
                let b64 = env::var(var)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| CredentialError::Missing(var.clone()))?;
                decode_service_account(&b64)
            }
            CredentialSource::Inline { b64 } => decode_service_account(b64),
        }
    }
}
