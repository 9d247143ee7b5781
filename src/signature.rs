use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::AppError;
use crate::stripe_models::StripeEvent;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies Stripe-signed webhook payloads.
///
/// The header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`. The expected
/// signature is `hex(HMAC-SHA256(secret, "<t>.<raw body>"))`. Any matching
/// `v1` entry is accepted as long as `t` lies within the tolerance window.
/// The body is parsed only after the signature checks out.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verifies against the current wall clock.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<StripeEvent, AppError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verifies as if the current time were `now` (unix seconds).
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<StripeEvent, AppError> {
        let parsed = parse_header(header)?;

        // `t` is caller-controlled; an unrepresentable skew is out of tolerance
        let skew = now.checked_sub(parsed.timestamp).map(i64::unsigned_abs);
        if skew.map_or(true, |skew| skew > self.tolerance_secs.unsigned_abs()) {
            tracing::warn!(
                "Webhook timestamp outside tolerance: t={}, now={}",
                parsed.timestamp,
                now
            );
            return Err(AppError::Authentication(
                "Webhook timestamp outside tolerance".to_string(),
            ));
        }

        let matched = parsed.signatures.iter().any(|candidate| {
            let mac = self.mac_for(parsed.timestamp, payload);
            mac.verify_slice(candidate).is_ok()
        });

        if !matched {
            return Err(AppError::Authentication("Invalid signature".to_string()));
        }

        serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("Malformed event payload: {}", e)))
    }

    /// Builds a signature header for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let mac = self.mac_for(timestamp, payload);
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

fn parse_header(header: &str) -> Result<SignatureHeader, AppError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            // Undecodable entries can never match, skip them
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        AppError::Authentication("Missing timestamp in signature header".to_string())
    })?;

    if signatures.is_empty() {
        return Err(AppError::Authentication(
            "Missing v1 signature in signature header".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}
