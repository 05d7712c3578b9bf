//! Payment header codec: decodes the `payment-signature`/`x-payment`
//! header into a structured payload and classifies it by rail.
//!
//! Address/hex validation uses a `Lazy<Regex>`, compiled once and reused.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::chain::{FAST_RAIL, SLOW_RAIL_A, SLOW_RAIL_B};

static HEADER_NAMES: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["payment-signature", "x-payment"]);

static CAIP2_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-z0-9]{3,8}:[-a-zA-Z0-9]{1,32}$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rail {
    Fast,
    SlowA,
    SlowB,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedRequirement {
    pub scheme: String,
    pub caip2: String,
    pub amount: String,
    pub asset: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHeaderPayload {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub accepted: AcceptedRequirement,
    pub payload: serde_json::Value,
}

impl PaymentHeaderPayload {
    pub fn rail(&self) -> Rail {
        classify(&self.accepted.caip2)
    }
}

fn classify(caip2: &str) -> Rail {
    if !CAIP2_RE.is_match(caip2) {
        return Rail::Unknown;
    }
    if caip2 == FAST_RAIL.caip2 {
        Rail::Fast
    } else if caip2 == SLOW_RAIL_A.caip2 {
        Rail::SlowA
    } else if caip2 == SLOW_RAIL_B.caip2 {
        Rail::SlowB
    } else {
        Rail::Unknown
    }
}

/// Returns the first matching payment header's raw value, checking each accepted
/// header name case-insensitively. Either header name is acceptable if both are
/// present.
pub fn extract_header_value<'a>(
    headers: &'a axum::http::HeaderMap,
) -> Option<&'a axum::http::HeaderValue> {
    HEADER_NAMES
        .iter()
        .find_map(|name| headers.get(*name))
}

/// Decodes a base64-JSON payment header. Malformed input is treated as "no payment
/// header" rather than an error, since the caller's fallback is always
/// to advertise a fresh 402.
pub fn decode(raw: &axum::http::HeaderValue) -> Option<PaymentHeaderPayload> {
    let raw = raw.to_str().ok()?;
    let decoded = BASE64.decode(raw).ok()?;
    serde_json::from_slice(&decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(caip2: &str) -> PaymentHeaderPayload {
        PaymentHeaderPayload {
            x402_version: 2,
            accepted: AcceptedRequirement {
                scheme: "exact".to_string(),
                caip2: caip2.to_string(),
                amount: "1000000".to_string(),
                asset: "USDC".to_string(),
                pay_to: "0xabc".to_string(),
            },
            payload: json!({ "txHash": "0xdead" }),
        }
    }

    #[test]
    fn classifies_fast_rail() {
        assert_eq!(sample(FAST_RAIL.caip2).rail(), Rail::Fast);
    }

    #[test]
    fn classifies_slow_rail_a() {
        assert_eq!(sample(SLOW_RAIL_A.caip2).rail(), Rail::SlowA);
    }

    #[test]
    fn classifies_slow_rail_b() {
        assert_eq!(sample(SLOW_RAIL_B.caip2).rail(), Rail::SlowB);
    }

    #[test]
    fn unknown_caip2_classifies_unknown() {
        assert_eq!(sample("eip155:999999").rail(), Rail::Unknown);
    }

    #[test]
    fn malformed_caip2_classifies_unknown() {
        assert_eq!(sample("not-a-caip2!!").rail(), Rail::Unknown);
    }

    #[test]
    fn base64_json_round_trips() {
        let payload = sample(FAST_RAIL.caip2);
        let json_bytes = serde_json::to_vec(&payload).unwrap();
        let encoded = BASE64.encode(json_bytes);
        let header = axum::http::HeaderValue::from_str(&encoded).unwrap();
        let decoded = decode(&header).unwrap();
        assert_eq!(decoded.accepted.caip2, FAST_RAIL.caip2);
        assert_eq!(decoded.payload, json!({ "txHash": "0xdead" }));
    }

    #[test]
    fn malformed_base64_decodes_to_none() {
        let header = axum::http::HeaderValue::from_static("not valid base64!!!");
        assert!(decode(&header).is_none());
    }

    #[test]
    fn valid_base64_invalid_json_decodes_to_none() {
        let encoded = BASE64.encode(b"not json");
        let header = axum::http::HeaderValue::from_str(&encoded).unwrap();
        assert!(decode(&header).is_none());
    }
}
