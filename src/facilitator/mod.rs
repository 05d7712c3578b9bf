//! The `Facilitator` trait and its two implementations: a fast-rail
//! adapter backed by [`crate::onchain::OnChainVerifier`] and an HTTP client to an
//! external permit-based facilitator.
//!
//! `verify`/`settle`/`get_supported` each return `impl Future<Output = Result<_,
//! Self::Error>> + Send` (native async fn in traits), with a blanket
//! `impl<T: Facilitator> Facilitator for Arc<T>` so handlers can hold a
//! `Arc<dyn ...>`-free trait object by value.

pub mod external;
pub mod fast;

use std::fmt::{Debug, Display};
use std::sync::Arc;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::onchain::VerificationFailure;

/// Opaque per-rail payment proof, supplied by the caller in the payment header.
#[derive(Debug, Clone)]
pub struct PaymentPayload {
    /// Fast rail: the transaction hash. Slow rails: an opaque blob handed verbatim
    /// to the external facilitator.
    pub raw: serde_json::Value,
}

impl PaymentPayload {
    pub fn tx_hash(&self) -> Option<&str> {
        self.raw.get("txHash").and_then(|v| v.as_str())
    }
}

/// What a payment must satisfy to be accepted (derived from an `AcceptEntry`).
#[derive(Debug, Clone)]
pub struct PaymentRequirement {
    pub caip2: String,
    pub amount_base_units: U256,
    pub pay_to: String,
}

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub payload: PaymentPayload,
    pub requirement: PaymentRequirement,
}

#[derive(Debug, Clone)]
pub struct SettleRequest {
    pub payload: PaymentPayload,
    pub requirement: PaymentRequirement,
}

/// Outcome of [`Facilitator::verify`].
///
/// `payer` is a rail-native address string rather than `alloy_primitives::Address`:
/// the slow rails aren't all EVM chains (the Solana rail's addresses are base58, not
/// hex), so the payer representation has to stay opaque at this layer.
#[derive(Debug, Clone)]
pub enum VerifyResponse {
    Valid { payer: String },
    Invalid { reason: VerificationFailure },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub success: bool,
    pub transaction: String,
    pub caip2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedManifestEntry {
    pub scheme: &'static str,
    pub caip2: String,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    pub kinds: Vec<SupportedManifestEntry>,
}

/// Implemented by each settlement rail's adapter.
pub trait Facilitator {
    type Error: Debug + Display;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    fn get_supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send;
}

impl<T: Facilitator + Sync> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }

    fn get_supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send {
        self.as_ref().get_supported()
    }
}
