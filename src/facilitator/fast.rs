//! Fast-rail facilitator adapter: implements the `Facilitator` contract
//! by delegating straight to [`crate::onchain::OnChainVerifier`].

use serde_json::json;
use thiserror::Error;

use crate::chain::FAST_RAIL;
use crate::ledger::Ledger;
use crate::onchain::OnChainVerifier;

use super::{
    Facilitator, SettleRequest, SettleResponse, SupportedManifestEntry, SupportedResponse,
    VerifyRequest, VerifyResponse,
};

#[derive(Debug, Error)]
pub enum FastRailFacilitatorError {
    #[error("payment proof missing txHash")]
    MissingTxHash,
}

pub struct FastRailFacilitator {
    verifier: OnChainVerifier,
    ledger: std::sync::Arc<Ledger>,
}

impl FastRailFacilitator {
    pub fn new(verifier: OnChainVerifier, ledger: std::sync::Arc<Ledger>) -> Self {
        Self { verifier, ledger }
    }
}

impl Facilitator for FastRailFacilitator {
    type Error = FastRailFacilitatorError;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        let tx_hash = request
            .payload
            .tx_hash()
            .ok_or(FastRailFacilitatorError::MissingTxHash)?;
        let outcome = self
            .verifier
            .verify(
                tx_hash,
                &request.requirement.pay_to,
                request.requirement.amount_base_units,
                &request.requirement.caip2,
                &self.ledger,
            )
            .await;
        match outcome {
            Ok(payer) => Ok(VerifyResponse::Valid {
                payer: format!("{payer:#x}"),
            }),
            Err(reason) => Ok(VerifyResponse::Invalid { reason }),
        }
    }

    /// No-op: on the fast rail the transfer already happened on-chain by the time a
    /// client presents proof of it.
    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        let tx_hash = request
            .payload
            .tx_hash()
            .ok_or(FastRailFacilitatorError::MissingTxHash)?;
        Ok(SettleResponse {
            success: true,
            transaction: tx_hash.to_string(),
            caip2: request.requirement.caip2.clone(),
        })
    }

    async fn get_supported(&self) -> Result<SupportedResponse, Self::Error> {
        Ok(SupportedResponse {
            kinds: vec![SupportedManifestEntry {
                scheme: "exact",
                caip2: FAST_RAIL.caip2.to_string(),
                extra: json!({ "name": "x402-gateway-fast-rail", "version": "1" }),
            }],
        })
    }
}
