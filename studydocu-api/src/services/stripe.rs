// Stripe webhook verification and event decoding
use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    Missing,

    #[error("malformed Stripe-Signature header")]
    Malformed,

    #[error("timestamp outside tolerance")]
    Expired,

    #[error("no matching v1 signature")]
    Mismatch,
}

/// Checks `t=<unix>,v1=<hex>[,v1=...]` against HMAC-SHA256 of `"{t}.{payload}"`.
/// Any one matching `v1` is enough; comparison is constant time.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            // Undecodable v1 entries are skipped; another may still match
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(candidate).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Envelope shared by every event type. `data.object` stays untyped until the
/// event type says what it holds; many objects (balances, for one) have no `id`.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: StripeEventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeEventData {
    #[serde(default)]
    pub object: Value,
}

/// Checkout sessions and subscriptions, the only objects we act on.
#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    amount_total: Option<i64>,
    currency: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookAction {
    CheckoutCompleted {
        reference: String,
        user_id: Uuid,
        plan_code: String,
        amount_cents: Option<i64>,
        currency: Option<String>,
    },
    SubscriptionDeleted {
        user_id: Uuid,
    },
    Ignored {
        event_type: String,
        reason: &'static str,
    },
}

fn metadata_user(object: &StripeObject) -> Option<Uuid> {
    object
        .metadata
        .get("user_id")
        .and_then(|id| Uuid::parse_str(id).ok())
}

impl StripeEvent {
    /// Events we cannot act on are acknowledged rather than retried.
    pub fn action(self) -> WebhookAction {
        let ignored = |event_type: String, reason| WebhookAction::Ignored { event_type, reason };

        match self.event_type.as_str() {
            "checkout.session.completed" | "customer.subscription.deleted" => {}
            _ => return ignored(self.event_type, "unhandled event type"),
        }

        let Ok(object) = serde_json::from_value::<StripeObject>(self.data.object) else {
            return ignored(self.event_type, "unexpected object shape");
        };

        if self.event_type == "customer.subscription.deleted" {
            return match metadata_user(&object) {
                Some(user_id) => WebhookAction::SubscriptionDeleted { user_id },
                None => ignored(self.event_type, "missing user_id metadata"),
            };
        }

        let user_id = metadata_user(&object);
        let plan_code = object.metadata.get("plan_code").cloned();
        match (user_id, plan_code) {
            (Some(user_id), Some(plan_code)) => WebhookAction::CheckoutCompleted {
                reference: object.id,
                user_id,
                plan_code,
                amount_cents: object.amount_total,
                currency: object.currency.map(|c| c.to_ascii_uppercase()),
            },
            _ => ignored(self.event_type, "missing user_id or plan_code metadata"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_767_225_600;

    #[test]
    fn accepts_a_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, NOW, payload);
        assert_eq!(verify_signature(SECRET, Some(&header), payload, NOW + 10, 300), Ok(()));
    }

    #[test]
    fn any_v1_may_match() {
        let payload = b"{}";
        let good = sign(SECRET, NOW, payload);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good_sig);
        assert_eq!(verify_signature(SECRET, Some(&header), payload, NOW, 300), Ok(()));
    }

    #[test]
    fn rejects_tampered_payloads_and_wrong_secrets() {
        let header = sign(SECRET, NOW, b"original");
        assert_eq!(
            verify_signature(SECRET, Some(&header), b"tampered", NOW, 300),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("whsec_other", Some(&header), b"original", NOW, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_malformed_headers() {
        let header = sign(SECRET, NOW, b"{}");
        assert_eq!(
            verify_signature(SECRET, Some(&header), b"{}", NOW + 301, 300),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(SECRET, None, b"{}", NOW, 300),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature(SECRET, Some("v1=abcd"), b"{}", NOW, 300),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, Some("t=123"), b"{}", NOW, 300),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn checkout_completed_carries_metadata() {
        let user_id = Uuid::new_v4();
        let raw = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "amount_total": 1299,
                "currency": "usd",
                "metadata": {"user_id": user_id.to_string(), "plan_code": "trimestral"}
            }}
        });
        let event: StripeEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event.action(),
            WebhookAction::CheckoutCompleted {
                reference: "cs_test_1".into(),
                user_id,
                plan_code: "trimestral".into(),
                amount_cents: Some(1299),
                currency: Some("USD".into()),
            }
        );
    }

    #[test]
    fn unknown_events_are_ignored() {
        let raw = serde_json::json!({
            "id": "evt_2",
            "type": "invoice.paid",
            "data": {"object": {"id": "in_1"}}
        });
        let event: StripeEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(event.action(), WebhookAction::Ignored { .. }));
    }

    #[test]
    fn objects_without_an_id_are_acknowledged() {
        let raw = serde_json::json!({
            "id": "evt_3",
            "type": "balance.available",
            "data": {"object": {"object": "balance", "available": []}}
        });
        let event: StripeEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event.action(),
            WebhookAction::Ignored {
                event_type: "balance.available".into(),
                reason: "unhandled event type",
            }
        );
    }

    #[test]
    fn handled_type_with_odd_object_is_ignored() {
        let raw = serde_json::json!({
            "id": "evt_4",
            "type": "customer.subscription.deleted",
            "data": {"object": {"object": "subscription"}}
        });
        let event: StripeEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(event.action(), WebhookAction::Ignored { .. }));
    }

    #[test]
    fn extreme_timestamps_are_expired_not_overflowed() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1={}", t, "00".repeat(32));
            assert_eq!(
                verify_signature(SECRET, Some(&header), b"{}", NOW, 300),
                Err(SignatureError::Expired)
            );
        }
        let header = format!("t={},v1=00", i64::MIN);
        assert_eq!(
            verify_signature(SECRET, Some(&header), b"{}", i64::MAX, i64::MIN),
            Err(SignatureError::Expired)
        );
    }
}
