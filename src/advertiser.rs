//! 402 Advertiser: builds the payment-requirements response for any
//! unpaid paid route.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::chain::{Chain, FAST_RAIL, SLOW_RAIL_A, SLOW_RAIL_B};
use crate::config::Config;
use crate::decimal::price_to_base_units;
use crate::service::Service;

/// One rail's payment requirement for a given service.
///
/// `price` is intentionally omitted: a client echoes this entry verbatim in its
/// payment payload, and strict equality on the server side must still match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptEntry {
    pub scheme: &'static str,
    pub caip2: String,
    pub asset: String,
    pub amount: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub url: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequiredBody {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub error: &'static str,
    pub resource: Resource,
    pub accepts: Vec<AcceptEntry>,
}

fn pay_to_for(chain: &Chain, config: &Config) -> String {
    match chain.caip2 {
        caip2 if caip2 == SLOW_RAIL_B.caip2 => config.pay_to_slow_b.clone(),
        _ => config.pay_to_fast.clone(),
    }
}

/// Per-chain `extra` metadata a client needs to construct a valid payment: an
/// EIP-712 domain name/version for the permit-based rails, plus a fee-payer address
/// for the Solana rail, whose transactions require a separate fee payer from the
/// token sender.
fn extra_for(chain: &Chain, config: &Config) -> serde_json::Value {
    match chain.rail {
        crate::chain::Rail::Fast => serde_json::json!({
            "name": "x402-gateway-fast-rail",
            "version": "1",
        }),
        crate::chain::Rail::SlowA => serde_json::json!({
            "name": chain.stablecoin.symbol,
            "version": "2",
        }),
        crate::chain::Rail::SlowB => serde_json::json!({
            "name": chain.stablecoin.symbol,
            "version": "2",
            "feePayer": config.pay_to_slow_b,
        }),
    }
}

fn accept_entry_for(chain: &Chain, service: &Service, config: &Config) -> AcceptEntry {
    let amount = price_to_base_units(&service.price, chain.decimals())
        .expect("catalog prices are validated at load time")
        .to_string();
    AcceptEntry {
        scheme: "exact",
        caip2: chain.caip2.to_string(),
        asset: chain.stablecoin.contract_address.to_string(),
        amount,
        pay_to: pay_to_for(chain, config),
        max_timeout_seconds: 60,
        extra: extra_for(chain, config),
    }
}

/// Builds the 402 body for `service`, one `accepts` entry per enabled rail in a
/// stable order (fast, slow-A, slow-B).
pub fn build_payment_required(service: &Service, base_url: &str, config: &Config) -> PaymentRequiredBody {
    let accepts = vec![
        accept_entry_for(&FAST_RAIL, service, config),
        accept_entry_for(&SLOW_RAIL_A, service, config),
        accept_entry_for(&SLOW_RAIL_B, service, config),
    ];
    PaymentRequiredBody {
        x402_version: 2,
        error: "Payment required",
        resource: Resource {
            url: format!("{base_url}{}", service.path),
            description: service.description.clone(),
            mime_type: service.mime_type.clone(),
        },
        accepts,
    }
}

/// Encodes the body as the `PAYMENT-REQUIRED` header value.
pub fn encode_header_value(body: &PaymentRequiredBody) -> String {
    let json = serde_json::to_vec(body).expect("PaymentRequiredBody always serializes");
    BASE64.encode(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Method, ServiceRegistry};
    use std::collections::HashMap;
    use url::Url;

    fn test_config() -> Config {
        Config {
            host: "0.0.0.0".parse().unwrap(),
            port: 8080,
            database_url: Url::parse("postgres://localhost/test").unwrap(),
            database_pool_size: 5,
            pay_to_fast: "0xfast".to_string(),
            pay_to_slow_b: "slowBaddress".to_string(),
            fast_rail_rpc_url: Url::parse("http://localhost:8545").unwrap(),
            fast_rail_stablecoin_address: "0xstable".to_string(),
            external_facilitator_url: Url::parse("http://localhost:9000").unwrap(),
            provider_secrets: HashMap::new(),
            provider_upstream_urls: HashMap::new(),
            dev_bypass_secret: None,
            dev_bypass_enabled: false,
            request_log_retention_days: 30,
        }
    }

    fn sample_service() -> Service {
        ServiceRegistry::load_embedded().all()[0].clone()
    }

    #[test]
    fn builds_one_accept_entry_per_rail() {
        let body = build_payment_required(&sample_service(), "https://gw.example", &test_config());
        assert_eq!(body.accepts.len(), 3);
        assert_eq!(body.accepts[0].caip2, FAST_RAIL.caip2);
        assert_eq!(body.accepts[1].caip2, SLOW_RAIL_A.caip2);
        assert_eq!(body.accepts[2].caip2, SLOW_RAIL_B.caip2);
    }

    #[test]
    fn omits_human_readable_price() {
        let body = build_payment_required(&sample_service(), "https://gw.example", &test_config());
        let json = serde_json::to_value(&body.accepts[0]).unwrap();
        assert!(json.get("price").is_none());
    }

    #[test]
    fn slow_rail_b_uses_distinct_recipient() {
        let body = build_payment_required(&sample_service(), "https://gw.example", &test_config());
        assert_eq!(body.accepts[2].pay_to, "slowBaddress");
        assert_eq!(body.accepts[0].pay_to, "0xfast");
    }

    #[test]
    fn header_value_round_trips_through_base64_json() {
        let body = build_payment_required(&sample_service(), "https://gw.example", &test_config());
        let encoded = encode_header_value(&body);
        let decoded_bytes = BASE64.decode(encoded).unwrap();
        let decoded: PaymentRequiredBody = serde_json::from_slice(&decoded_bytes).unwrap();
        assert_eq!(decoded.accepts.len(), body.accepts.len());
    }

    #[test]
    fn slow_rail_b_extra_carries_fee_payer() {
        let body = build_payment_required(&sample_service(), "https://gw.example", &test_config());
        assert_eq!(
            body.accepts[2].extra.get("feePayer").and_then(|v| v.as_str()),
            Some("slowBaddress")
        );
    }

    #[test]
    fn fast_rail_extra_has_no_fee_payer() {
        let body = build_payment_required(&sample_service(), "https://gw.example", &test_config());
        assert!(body.accepts[0].extra.get("feePayer").is_none());
    }

    #[test]
    fn method_equality_is_derivable() {
        let _ = Method::Get == Method::Get;
    }
}
