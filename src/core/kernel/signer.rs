use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use base64::alphabet;
use base64::engine::{general_purpose, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Standard alphabet decoder that tolerates non-zero trailing bits, as the
/// exchange's own decoder does for issued secrets.
const SECRET_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

pub const ACCESS_KEY_HEADER: &str = "CB-ACCESS-KEY";
pub const ACCESS_PASSPHRASE_HEADER: &str = "CB-ACCESS-PASSPHRASE";
pub const ACCESS_TIMESTAMP_HEADER: &str = "CB-ACCESS-TIMESTAMP";
pub const ACCESS_SIGN_HEADER: &str = "CB-ACCESS-SIGN";

/// Headers to attach to a signed request
pub type SignatureResult = Result<Vec<(&'static str, String)>, ExchangeError>;

/// Signer trait for request authentication
pub trait Signer: Send + Sync {
    /// Sign a request and return the headers that carry the signature
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `path` - Request path exactly as sent, query string included
    /// * `body` - Raw request body bytes (empty when there is no body)
    /// * `timestamp` - Unix epoch seconds
    fn sign_request(&self, method: &str, path: &str, body: &[u8], timestamp: u64) -> SignatureResult;
}

/// base64(HMAC-SHA256(base64-decode(secret), message))
pub fn sign(secret: &str, message: &[u8]) -> Result<String, ExchangeError> {
    let key = SECRET_ENGINE
        .decode(secret)
        .map_err(|e| ExchangeError::EncodingError(format!("Invalid base64 secret: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| ExchangeError::EncodingError(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message);

    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// The pre-hash string is `timestamp + method + path + body`
pub fn prehash(timestamp: &str, method: &str, path: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + method.len() + path.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(method.as_bytes());
    message.extend_from_slice(path.as_bytes());
    message.extend_from_slice(body);
    message
}

/// HMAC-SHA256 signer producing the `CB-ACCESS-*` header set
pub struct HmacSigner {
    credentials: Credentials,
}

impl HmacSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn sign_request(&self, method: &str, path: &str, body: &[u8], timestamp: u64) -> SignatureResult {
        // Decimal epoch seconds, no padding or fraction
        let timestamp = timestamp.to_string();
        let signature = sign(
            self.credentials.secret.expose_secret(),
            &prehash(&timestamp, method, path, body),
        )?;

        Ok(vec![
            (ACCESS_KEY_HEADER, self.credentials.key.expose_secret().clone()),
            (
                ACCESS_PASSPHRASE_HEADER,
                self.credentials.passphrase.expose_secret().clone(),
            ),
            (ACCESS_TIMESTAMP_HEADER, timestamp),
            (ACCESS_SIGN_HEADER, signature),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_signature() {
        let signature = sign("zZ==", b"1GET/test").unwrap();
        assert_eq!(signature, "2A+P3UPYN+cYs7ehkTJOLK/mkIHgHk1cahG1BCGDHRs=");
    }

    #[test]
    fn test_sign_is_deterministic() {
        let message = prehash("1617994800", "POST", "/orders/", br#"{"size":"1"}"#);
        let first = sign("c2VjcmV0LWtleQ==", &message).unwrap();
        let second = sign("c2VjcmV0LWtleQ==", &message).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, sign("c2VjcmV0LWtleQ==", b"other").unwrap());
    }

    #[test]
    fn test_invalid_secret() {
        let err = sign("not base64!", b"message").unwrap_err();
        assert!(matches!(err, ExchangeError::EncodingError(_)));
    }

    #[test]
    fn test_prehash_concatenation() {
        assert_eq!(prehash("1", "GET", "/time", b""), b"1GET/time".to_vec());
    }

    #[test]
    fn test_signer_headers() {
        let signer = HmacSigner::new(Credentials::new("k".into(), "p".into(), "zZ==".into()));
        let headers = signer.sign_request("GET", "/test", &[], 1).unwrap();

        assert!(headers.contains(&(ACCESS_KEY_HEADER, "k".to_string())));
        assert!(headers.contains(&(ACCESS_PASSPHRASE_HEADER, "p".to_string())));
        assert!(headers.contains(&(ACCESS_TIMESTAMP_HEADER, "1".to_string())));
        assert!(headers.contains(&(
            ACCESS_SIGN_HEADER,
            "2A+P3UPYN+cYs7ehkTJOLK/mkIHgHk1cahG1BCGDHRs=".to_string()
        )));
    }
}
