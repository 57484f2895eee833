use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::IngestError;

type HmacSha256 = Hmac<Sha256>;

fn digest(secret: &str, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Lowercase hex HMAC-SHA256 of `body` keyed by `secret`.
#[must_use]
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    digest(secret, body).map(hex::encode).unwrap_or_default()
}

/// Checks `signature` against the HMAC-SHA256 of the raw `body`.
///
/// Accepts hex in either case, with or without a `sha256=` prefix. The
/// comparison is constant-time.
///
/// # Errors
///
/// Returns [`IngestError::MissingSecret`] when no secret is configured and
/// [`IngestError::InvalidSignature`] when the signature is absent, not hex,
/// or does not match.
pub fn verify_signature(
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), IngestError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(IngestError::MissingSecret)?;
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(IngestError::InvalidSignature)?;
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let provided = hex::decode(signature).map_err(|_| IngestError::InvalidSignature)?;
    let expected = digest(secret, body).ok_or(IngestError::InvalidSignature)?;

    if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(IngestError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"crawl.page","metadata":{"jobId":"x"}}"#;

    #[test]
    fn correct_signature_is_accepted() {
        let sig = sign_payload(SECRET, BODY);
        assert_eq!(sig.len(), 64);
        verify_signature(Some(SECRET), Some(&sig), BODY).unwrap();
    }

    #[test]
    fn prefix_and_uppercase_hex_are_accepted() {
        let sig = format!("sha256={}", sign_payload(SECRET, BODY).to_uppercase());
        verify_signature(Some(SECRET), Some(&sig), BODY).unwrap();
    }

    #[test]
    fn single_byte_tamper_is_rejected() {
        let sig = sign_payload(SECRET, BODY);
        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            let err = verify_signature(Some(SECRET), Some(&sig), &tampered).unwrap_err();
            assert!(matches!(err, IngestError::InvalidSignature), "byte {i}");
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let sig = sign_payload("other", BODY);
        assert!(verify_signature(Some(SECRET), Some(&sig), BODY).is_err());
    }

    #[test]
    fn missing_secret_or_signature_is_rejected() {
        let sig = sign_payload(SECRET, BODY);
        assert!(matches!(
            verify_signature(None, Some(&sig), BODY),
            Err(IngestError::MissingSecret)
        ));
        assert!(matches!(
            verify_signature(Some(""), Some(&sig), BODY),
            Err(IngestError::MissingSecret)
        ));
        assert!(matches!(
            verify_signature(Some(SECRET), None, BODY),
            Err(IngestError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(Some(SECRET), Some("not-hex"), BODY),
            Err(IngestError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(Some(SECRET), Some(&sig[..10]), BODY),
            Err(IngestError::InvalidSignature)
        ));
    }
}
