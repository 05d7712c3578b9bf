//! External facilitator client: a strict wire proxy to an external
//! permit-based settlement service reachable over HTTP. The core never interprets
//! rail-specific payload semantics for the slow rails — it only forwards and
//! classifies transport failures as `upstream_unavailable`.

use std::time::Duration;

use serde_json::json;
use thiserror::Error;

use crate::onchain::VerificationFailure;

use super::{
    Facilitator, SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
};

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ExternalFacilitatorError {
    #[error("external facilitator unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("external facilitator returned a malformed response")]
    MalformedResponse,
}

pub struct ExternalFacilitatorClient {
    client: reqwest::Client,
    base_url: url::Url,
}

impl ExternalFacilitatorClient {
    pub fn new(base_url: url::Url) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .expect("reqwest client configuration is valid");
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> url::Url {
        self.base_url
            .join(path)
            .expect("facilitator endpoint path is a valid relative URL")
    }
}

impl Facilitator for ExternalFacilitatorClient {
    type Error = ExternalFacilitatorError;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        let body = json!({
            "paymentPayload": request.payload.raw,
            "paymentRequirements": {
                "caip2": request.requirement.caip2,
                "amount": request.requirement.amount_base_units.to_string(),
                "payTo": request.requirement.pay_to,
            },
        });
        let response = self
            .client
            .post(self.endpoint("/verify"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(VerifyResponse::Invalid {
                reason: VerificationFailure::UpstreamUnavailable,
            });
        }
        let parsed: serde_json::Value = response.json().await?;
        let is_valid = parsed
            .get("isValid")
            .and_then(|v| v.as_bool())
            .ok_or(ExternalFacilitatorError::MalformedResponse)?;
        if !is_valid {
            return Ok(VerifyResponse::Invalid {
                reason: VerificationFailure::FacilitatorRejected,
            });
        }
        let payer = parsed
            .get("payer")
            .and_then(|v| v.as_str())
            .map(|raw| raw.to_string())
            .ok_or(ExternalFacilitatorError::MalformedResponse)?;
        Ok(VerifyResponse::Valid { payer })
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        let body = json!({
            "paymentPayload": request.payload.raw,
            "paymentRequirements": {
                "caip2": request.requirement.caip2,
                "amount": request.requirement.amount_base_units.to_string(),
                "payTo": request.requirement.pay_to,
            },
        });
        let response = self
            .client
            .post(self.endpoint("/settle"))
            .json(&body)
            .send()
            .await?;
        response
            .json::<SettleResponse>()
            .await
            .map_err(ExternalFacilitatorError::Transport)
    }

    async fn get_supported(&self) -> Result<SupportedResponse, Self::Error> {
        let response = self
            .client
            .get(self.endpoint("/supported"))
            .send()
            .await?;
        response
            .json::<SupportedResponse>()
            .await
            .map_err(ExternalFacilitatorError::Transport)
    }
}
