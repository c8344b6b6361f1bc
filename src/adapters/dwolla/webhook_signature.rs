//! Dwolla webhook signature verification.
//!
//! Dwolla signs the raw request body with HMAC-SHA256 keyed by the webhook
//! subscription secret and sends the hex digest in
//! `X-Request-Signature-SHA-256`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Request-Signature-SHA-256";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Missing {SIGNATURE_HEADER} header")]
    Missing,

    #[error("Signature is not valid hex")]
    Malformed,

    #[error("Invalid signature")]
    Mismatch,
}

#[derive(Clone)]
pub struct WebhookSignatureVerifier {
    secret: SecretString,
}

impl WebhookSignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn digest(&self, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Hex signature Dwolla would send for this payload.
    pub fn sign(&self, payload: &[u8]) -> Result<String, SignatureError> {
        self.digest(payload).map(hex::encode)
    }

    /// Checks the header value against the payload in constant time.
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature.ok_or(SignatureError::Missing)?;
        let provided = hex::decode(signature.trim()).map_err(|_| SignatureError::Malformed)?;
        let expected = self.digest(payload)?;

        if expected.ct_eq(&provided).unwrap_u8() != 1 {
            tracing::warn!("Invalid webhook signature");
            return Err(SignatureError::Mismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookSignatureVerifier {
        WebhookSignatureVerifier::new(SecretString::new("webhook-secret".to_string()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"id":"e1"}"#;
        let signature = verifier().sign(payload).unwrap();
        assert!(verifier().verify(payload, Some(&signature)).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signature = verifier().sign(br#"{"id":"e1"}"#).unwrap();
        assert_eq!(
            verifier().verify(br#"{"id":"e2"}"#, Some(&signature)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn missing_and_malformed_headers_are_rejected() {
        assert_eq!(verifier().verify(b"{}", None), Err(SignatureError::Missing));
        assert_eq!(verifier().verify(b"{}", Some("zz")), Err(SignatureError::Malformed));
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let signature = verifier().sign(b"{}").unwrap();
        assert_eq!(
            verifier().verify(b"{}", Some(&signature[..10])),
            Err(SignatureError::Mismatch)
        );
    }
}
