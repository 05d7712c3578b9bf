//! Fast-rail on-chain verifier: fetches a transaction receipt and
//! validates a stablecoin `Transfer` event against an expected recipient and amount.
//!
//! RPC access goes through `alloy_provider::{Provider, ProviderBuilder}` over
//! `alloy_transport_http`; there's no wallet/signing half since this verifier only
//! ever reads receipts.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionReceipt;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ledger::Ledger;

/// Reason a payment proof failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFailure {
    MissingProof,
    MalformedProof,
    NotFound,
    Reverted,
    WrongToken,
    WrongRecipient,
    InsufficientAmount,
    Replayed,
    FacilitatorRejected,
    UpstreamUnavailable,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationFailure::MissingProof => "missing_proof",
            VerificationFailure::MalformedProof => "malformed_proof",
            VerificationFailure::NotFound => "not_found",
            VerificationFailure::Reverted => "reverted",
            VerificationFailure::WrongToken => "wrong_token",
            VerificationFailure::WrongRecipient => "wrong_recipient",
            VerificationFailure::InsufficientAmount => "insufficient_amount",
            VerificationFailure::Replayed => "replayed",
            VerificationFailure::FacilitatorRejected => "facilitator_rejected",
            VerificationFailure::UpstreamUnavailable => "upstream_unavailable",
        };
        f.write_str(s)
    }
}

/// keccak256("Transfer(address,address,uint256)"), computed once and reused on every
/// verification.
static TRANSFER_TOPIC0: Lazy<alloy_primitives::B256> =
    Lazy::new(|| alloy_primitives::keccak256(b"Transfer(address,address,uint256)"));

const RECEIPT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// A parsed ERC-20 `Transfer` log, prior to filtering by recipient.
struct ParsedTransfer {
    from: Address,
    to: Address,
    value: U256,
}

/// Reads a transaction receipt from the fast-rail RPC and validates it.
pub struct OnChainVerifier {
    provider: Box<dyn Provider>,
    stablecoin_address: Address,
}

impl OnChainVerifier {
    pub fn new(rpc_url: &str, stablecoin_address: Address) -> anyhow::Result<Self> {
        let url = Url::parse(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url);
        Ok(Self {
            provider: Box::new(provider),
            stablecoin_address,
        })
    }

    /// Runs the full ten-step verification algorithm and, on success, records the
    /// proof in `ledger` to guarantee at-most-once acceptance.
    pub async fn verify(
        &self,
        tx_hash_raw: &str,
        recipient_raw: &str,
        expected_amount: U256,
        caip2: &str,
        ledger: &Ledger,
    ) -> Result<Address, VerificationFailure> {
        let tx_hash = parse_tx_hash(tx_hash_raw).ok_or(VerificationFailure::MalformedProof)?;
        let recipient = parse_address(recipient_raw).ok_or(VerificationFailure::MalformedProof)?;

        let receipt = self.fetch_receipt(tx_hash).await?;

        if !receipt.status() {
            return Err(VerificationFailure::Reverted);
        }

        let transfers = parse_transfers(&receipt, self.stablecoin_address);
        if transfers.is_empty() {
            return Err(VerificationFailure::WrongToken);
        }

        let mut total_to_recipient = U256::ZERO;
        let mut candidate_payer: Option<Address> = None;
        for transfer in &transfers {
            if transfer.to == recipient {
                total_to_recipient += transfer.value;
                candidate_payer.get_or_insert(transfer.from);
            }
        }

        if total_to_recipient.is_zero() {
            return Err(VerificationFailure::WrongRecipient);
        }
        if total_to_recipient < expected_amount {
            return Err(VerificationFailure::InsufficientAmount);
        }

        let payer = candidate_payer.expect("nonzero total implies at least one matching transfer");
        let proof_key = format!("{tx_hash:#x}").to_lowercase();
        let payer_str = format!("{payer:#x}");
        let accepted = ledger
            .record_proof(&proof_key, &payer_str, expected_amount, caip2)
            .await
            .map_err(|_| VerificationFailure::UpstreamUnavailable)?;
        if !accepted {
            return Err(VerificationFailure::Replayed);
        }

        Ok(payer)
    }

    async fn fetch_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, VerificationFailure> {
        let fetch = self.provider.get_transaction_receipt(tx_hash);
        match tokio::time::timeout(RECEIPT_FETCH_TIMEOUT, fetch).await {
            Ok(Ok(Some(receipt))) => Ok(receipt),
            Ok(Ok(None)) => Err(VerificationFailure::NotFound),
            Ok(Err(_)) => Err(VerificationFailure::UpstreamUnavailable),
            Err(_) => Err(VerificationFailure::UpstreamUnavailable),
        }
    }
}

fn parse_tx_hash(raw: &str) -> Option<TxHash> {
    let raw = raw.to_lowercase();
    if !raw.starts_with("0x") || raw.len() != 66 {
        return None;
    }
    TxHash::from_str(&raw).ok()
}

fn parse_address(raw: &str) -> Option<Address> {
    let raw = raw.to_lowercase();
    if !raw.starts_with("0x") || raw.len() != 42 {
        return None;
    }
    Address::from_str(&raw).ok()
}

fn parse_transfers(receipt: &TransactionReceipt, stablecoin: Address) -> Vec<ParsedTransfer> {
    receipt
        .inner
        .logs()
        .iter()
        .filter(|log| log.address() == stablecoin)
        .filter_map(|log| {
            let topics = log.topics();
            if topics.first() != Some(&*TRANSFER_TOPIC0) || topics.len() < 3 {
                return None;
            }
            let from = Address::from_word(topics[1]);
            let to = Address::from_word(topics[2]);
            let value = U256::from_be_slice(log.data().data.as_ref());
            Some(ParsedTransfer { from, to, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failure_serializes_snake_case() {
        let json = serde_json::to_string(&VerificationFailure::InsufficientAmount).unwrap();
        assert_eq!(json, "\"insufficient_amount\"");
    }

    #[test]
    fn display_matches_serde_tag() {
        assert_eq!(
            VerificationFailure::WrongRecipient.to_string(),
            "wrong_recipient"
        );
    }

    #[test]
    fn parse_tx_hash_rejects_wrong_length() {
        assert!(parse_tx_hash("0x1234").is_none());
    }

    #[test]
    fn parse_tx_hash_rejects_missing_prefix() {
        let hash = "1".repeat(64);
        assert!(parse_tx_hash(&hash).is_none());
    }

    #[test]
    fn parse_tx_hash_accepts_uppercase_hex() {
        let hash = format!("0x{}", "AB".repeat(32));
        assert!(parse_tx_hash(&hash).is_some());
    }

    #[test]
    fn parse_address_rejects_wrong_length() {
        assert!(parse_address("0xabc").is_none());
    }
}
