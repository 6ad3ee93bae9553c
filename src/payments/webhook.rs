//! Inbound payment notifications: envelope parsing and `x-signature` checks.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use super::LooseId;

type HmacSha256 = Hmac<Sha256>;

const PAYMENT_TOPIC: &str = "payment";

/// Provider payment ids are decimal integers.
const MAX_PAYMENT_ID_LEN: usize = 20;

/// Query string variants the provider uses (`?type=payment&data.id=…` or
/// the older `?topic=payment&id=…`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub topic: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    topic: Option<String>,
    data: Option<EnvelopeData>,
    resource: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    id: Option<LooseId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Payment { payment_id: String },
    /// Topic we do not reconcile (e.g. `merchant_order`).
    Ignored { topic: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("notification carries no payment id")]
    MissingPaymentId,
    #[error("payment id {0:?} is not numeric")]
    InvalidPaymentId(String),
}

fn is_payment_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_PAYMENT_ID_LEN && id.bytes().all(|b| b.is_ascii_digit())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extracts the payment id from a notification, looking at the JSON body
/// first and the query string second.
pub fn parse_notification(
    query: &NotificationQuery,
    body: &[u8],
) -> Result<Notification, NotificationError> {
    let envelope: Envelope = if body.iter().all(u8::is_ascii_whitespace) {
        Envelope::default()
    } else {
        serde_json::from_slice(body).map_err(|e| NotificationError::InvalidBody(e.to_string()))?
    };

    let topic = non_blank(envelope.kind)
        .or_else(|| non_blank(envelope.topic))
        .or_else(|| non_blank(query.kind.clone()))
        .or_else(|| non_blank(query.topic.clone()));

    if let Some(topic) = &topic {
        if !topic.eq_ignore_ascii_case(PAYMENT_TOPIC) {
            return Ok(Notification::Ignored {
                topic: topic.clone(),
            });
        }
    }

    let payment_id = envelope
        .data
        .and_then(|d| d.id)
        .map(LooseId::into_string)
        .filter(|id| !id.is_empty())
        .or_else(|| non_blank(query.data_id.clone()))
        .or_else(|| non_blank(query.id.clone()))
        .or_else(|| {
            non_blank(envelope.resource)
                .and_then(|r| r.rsplit('/').next().map(str::to_string))
                .filter(|id| !id.is_empty())
        })
        .ok_or(NotificationError::MissingPaymentId)?;

    if !is_payment_id(&payment_id) {
        return Err(NotificationError::InvalidPaymentId(payment_id));
    }
    Ok(Notification::Payment { payment_id })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("x-signature header missing")]
    Missing,
    #[error("x-signature header malformed")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Seconds since epoch; millisecond timestamps are accepted too.
fn ts_seconds(ts: &str) -> Option<i64> {
    let raw: i64 = ts.trim().parse().ok()?;
    if raw < 0 {
        return None;
    }
    Some(if raw > 100_000_000_000 { raw / 1000 } else { raw })
}

fn manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        // Alphanumeric ids are signed lowercased.
        manifest.push_str(&format!("id:{};", id.to_ascii_lowercase()));
    }
    if let Some(rid) = request_id.filter(|rid| !rid.is_empty()) {
        manifest.push_str(&format!("request-id:{};", rid));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

fn mac_for(secret: &str, manifest: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(manifest.as_bytes());
    Ok(mac)
}

/// Produces an `x-signature` header value.
pub fn sign(
    secret: &str,
    data_id: Option<&str>,
    request_id: Option<&str>,
    ts: i64,
) -> Result<String, SignatureError> {
    let ts = ts.to_string();
    let mac = mac_for(secret, &manifest(data_id, request_id, &ts))?;
    Ok(format!(
        "ts={},v1={}",
        ts,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verifies an `x-signature: ts=…,v1=…` header against the shared secret.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    request_id: Option<&str>,
    data_id: Option<&str>,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;

    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }
    let (ts, v1) = ts.zip(v1).ok_or(SignatureError::Malformed)?;

    let signed_at = ts_seconds(ts).ok_or(SignatureError::Malformed)?;
    if now.abs_diff(signed_at) > tolerance_secs {
        return Err(SignatureError::Stale);
    }

    let expected = hex::decode(v1).map_err(|_| SignatureError::Malformed)?;
    mac_for(secret, &manifest(data_id, request_id, ts))?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> NotificationQuery {
        NotificationQuery::default()
    }

    #[test]
    fn body_envelope_with_numeric_id() {
        let body = br#"{"type":"payment","action":"payment.updated","data":{"id":123456}}"#;
        assert_eq!(
            parse_notification(&query(), body).unwrap(),
            Notification::Payment {
                payment_id: "123456".into()
            }
        );
    }

    #[test]
    fn body_envelope_with_string_id_and_no_type() {
        let body = br#"{"data":{"id":"998"}}"#;
        assert_eq!(
            parse_notification(&query(), body).unwrap(),
            Notification::Payment {
                payment_id: "998".into()
            }
        );
    }

    #[test]
    fn query_string_variants() {
        let modern = NotificationQuery {
            kind: Some("payment".into()),
            data_id: Some("77".into()),
            ..Default::default()
        };
        assert_eq!(
            parse_notification(&modern, b"").unwrap(),
            Notification::Payment {
                payment_id: "77".into()
            }
        );

        let legacy = NotificationQuery {
            topic: Some("payment".into()),
            id: Some("78".into()),
            ..Default::default()
        };
        assert_eq!(
            parse_notification(&legacy, b"  ").unwrap(),
            Notification::Payment {
                payment_id: "78".into()
            }
        );
    }

    #[test]
    fn legacy_resource_url() {
        let body = br#"{"topic":"payment","resource":"https://api.mercadopago.com/v1/payments/4242"}"#;
        assert_eq!(
            parse_notification(&query(), body).unwrap(),
            Notification::Payment {
                payment_id: "4242".into()
            }
        );
    }

    #[test]
    fn other_topics_are_ignored() {
        let body = br#"{"type":"merchant_order","data":{"id":"1"}}"#;
        assert_eq!(
            parse_notification(&query(), body).unwrap(),
            Notification::Ignored {
                topic: "merchant_order".into()
            }
        );
    }

    #[test]
    fn missing_id_and_bad_json_are_rejected() {
        assert_eq!(
            parse_notification(&query(), br#"{"type":"payment","data":{}}"#),
            Err(NotificationError::MissingPaymentId)
        );
        assert_eq!(
            parse_notification(&query(), b""),
            Err(NotificationError::MissingPaymentId)
        );
        assert!(matches!(
            parse_notification(&query(), b"{not json"),
            Err(NotificationError::InvalidBody(_))
        ));
    }

    #[test]
    fn non_numeric_payment_ids_are_rejected() {
        let bodies: [&[u8]; 4] = [
            br#"{"type":"payment","data":{"id":"1/../../users/me"}}"#,
            br#"{"type":"payment","data":{"id":"12?access_token=x"}}"#,
            br#"{"type":"payment","data":{"id":"abc"}}"#,
            br#"{"type":"payment","data":{"id":"123456789012345678901"}}"#,
        ];
        for body in bodies {
            assert!(matches!(
                parse_notification(&query(), body),
                Err(NotificationError::InvalidPaymentId(_))
            ));
        }

        let traversal = NotificationQuery {
            topic: Some("payment".into()),
            id: Some("../v1/users/me".into()),
            ..Default::default()
        };
        assert!(matches!(
            parse_notification(&traversal, b""),
            Err(NotificationError::InvalidPaymentId(_))
        ));
    }

    #[test]
    fn signature_round_trip() {
        let now = 1_704_908_010;
        let header = sign("s3cret", Some("123"), Some("req-1"), now).unwrap();
        assert!(
            verify_signature("s3cret", Some(&header), Some("req-1"), Some("123"), 300, now).is_ok()
        );
    }

    #[test]
    fn signature_rejects_tampering_and_staleness() {
        let now = 1_704_908_010;
        let header = sign("s3cret", Some("123"), Some("req-1"), now).unwrap();

        assert_eq!(
            verify_signature("s3cret", Some(&header), Some("req-1"), Some("124"), 300, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("other", Some(&header), Some("req-1"), Some("123"), 300, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("s3cret", Some(&header), Some("req-1"), Some("123"), 300, now + 301),
            Err(SignatureError::Stale)
        );
        assert_eq!(
            verify_signature("s3cret", None, None, Some("123"), 300, now),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature("s3cret", Some("v1=abcd"), None, Some("123"), 300, now),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(
                "s3cret",
                Some("ts=-9223372036854775808,v1=00"),
                None,
                Some("123"),
                300,
                now
            ),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(
                "s3cret",
                Some("ts=9223372036854775807,v1=00"),
                None,
                Some("123"),
                300,
                i64::MIN
            ),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn millisecond_timestamps_are_accepted() {
        let now = 1_704_908_010;
        let ts_ms = now * 1000;
        let manifest = manifest(Some("123"), None, &ts_ms.to_string());
        let mac = mac_for("s3cret", &manifest).unwrap();
        let header = format!(
            "ts={},v1={}",
            ts_ms,
            hex::encode(mac.finalize().into_bytes())
        );
        assert!(verify_signature("s3cret", Some(&header), None, Some("123"), 300, now).is_ok());
    }
}
