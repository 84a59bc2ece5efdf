use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate the webhook payload signature.
///
/// Format: HMAC-SHA256("{timestamp}.{payload}", secret), hex-encoded.
/// This is the scheme the payment provider uses for event deliveries.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Build the signature header value for a payload, as the provider would.
/// Useful for tests and for self-signed internal deliveries.
pub fn signature_header(secret: &str, timestamp: i64, payload: &str) -> Result<String, anyhow::Error> {
    let sig = sign_payload(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, sig))
}

/// Verify a webhook signature header of the form `t=<unix>,v1=<hex>`.
///
/// Rejects deliveries whose timestamp is more than `tolerance_secs` away
/// from `now` to bound replay of captured payloads. Comparison is
/// constant-time.
pub fn verify_signature_header(
    secret: &str,
    header: &str,
    payload: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<bool, anyhow::Error> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let timestamp = match timestamp {
        Some(t) => t,
        None => return Ok(false),
    };
    if candidates.is_empty() {
        return Ok(false);
    }

    if (now - timestamp).abs() > tolerance_secs {
        return Ok(false);
    }

    let expected = sign_payload(secret, timestamp, payload)?;
    let expected_bytes = expected.as_bytes();

    for candidate in candidates {
        let candidate_bytes = candidate.as_bytes();
        if candidate_bytes.len() == expected_bytes.len()
            && bool::from(candidate_bytes.ct_eq(expected_bytes))
        {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &str = r#"{"id":"evt_123","type":"checkout.session.completed"}"#;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let now = 1678886400;
        let header = signature_header(SECRET, now, PAYLOAD).unwrap();

        let ok = verify_signature_header(SECRET, &header, PAYLOAD, 300, now).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = 1678886400;
        let header = signature_header(SECRET, now, PAYLOAD).unwrap();

        let tampered = r#"{"id":"evt_123","type":"customer.subscription.deleted"}"#;
        let ok = verify_signature_header(SECRET, &header, tampered, 300, now).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let issued = 1678886400;
        let header = signature_header(SECRET, issued, PAYLOAD).unwrap();

        let ok = verify_signature_header(SECRET, &header, PAYLOAD, 300, issued + 301).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_malformed_header_rejected() {
        let ok = verify_signature_header(SECRET, "garbage", PAYLOAD, 300, 0).unwrap();
        assert!(!ok);

        let ok = verify_signature_header(SECRET, "t=notanumber,v1=abc", PAYLOAD, 300, 0).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = 1678886400;
        let header = signature_header(SECRET, now, PAYLOAD).unwrap();

        let ok = verify_signature_header("whsec_other", &header, PAYLOAD, 300, now).unwrap();
        assert!(!ok);
    }
}
