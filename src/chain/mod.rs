//! Static registry of settlement chains.
//!
//! Three chains are supported: one fast rail (sub-second finality, verified by
//! reading transaction receipts directly) and two slow rails (settled through an
//! external facilitator). Each chain is a static table entry behind a `Lazy`,
//! carrying both EVM- and non-EVM-style recipient addresses.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A stablecoin deployment on a given chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stablecoin {
    pub symbol: &'static str,
    pub contract_address: &'static str,
    pub decimals: u8,
}

/// Identifies which settlement rail a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rail {
    /// Sub-second finality, verified by reading a transaction receipt directly.
    Fast,
    /// Settled through an external permit-based facilitator.
    SlowA,
    SlowB,
}

/// A supported payment network.
///
/// Invariant: `decimals` is 6 or 18. `caip2` uniquely identifies the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: u64,
    pub caip2: &'static str,
    pub display_name: &'static str,
    pub rail: Rail,
    pub stablecoin: Stablecoin,
    pub block_time_ms: u64,
}

impl Chain {
    pub const fn decimals(&self) -> u8 {
        self.stablecoin.decimals
    }
}

/// Fast rail: sub-second EVM-compatible chain, 18-decimal stablecoin.
pub static FAST_RAIL: Lazy<Chain> = Lazy::new(|| Chain {
    chain_id: 4326,
    caip2: "eip155:4326",
    display_name: "Fast Rail",
    rail: Rail::Fast,
    stablecoin: Stablecoin {
        symbol: "USDF",
        contract_address: "0x0000000000000000000000000000000000f457",
        decimals: 18,
    },
    block_time_ms: 10,
});

/// Slow rail A: EVM-compatible chain settled via an external facilitator, 6-decimal stablecoin.
pub static SLOW_RAIL_A: Lazy<Chain> = Lazy::new(|| Chain {
    chain_id: 8453,
    caip2: "eip155:8453",
    display_name: "Slow Rail A",
    rail: Rail::SlowA,
    stablecoin: Stablecoin {
        symbol: "USDC",
        contract_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        decimals: 6,
    },
    block_time_ms: 2000,
});

/// Slow rail B: non-EVM chain settled via an external facilitator, 6-decimal stablecoin.
/// Uses a distinct (non-hex) address format for both the stablecoin contract and
/// recipients.
pub static SLOW_RAIL_B: Lazy<Chain> = Lazy::new(|| Chain {
    chain_id: 0,
    caip2: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    display_name: "Slow Rail B",
    rail: Rail::SlowB,
    stablecoin: Stablecoin {
        symbol: "USDC",
        contract_address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        decimals: 6,
    },
    block_time_ms: 400,
});

/// Looks up a chain by its CAIP-2 identifier.
pub fn lookup(caip2: &str) -> Option<&'static Chain> {
    all().into_iter().find(|chain| chain.caip2 == caip2)
}

/// Returns all statically registered chains.
pub fn all() -> [&'static Chain; 3] {
    [&FAST_RAIL, &SLOW_RAIL_A, &SLOW_RAIL_B]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_are_six_or_eighteen() {
        for chain in all() {
            assert!(chain.decimals() == 6 || chain.decimals() == 18);
        }
    }

    #[test]
    fn caip2_is_unique() {
        let ids: Vec<_> = all().iter().map(|c| c.caip2).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids.len(), sorted.len());
    }

    #[test]
    fn lookup_finds_fast_rail() {
        let chain = lookup(FAST_RAIL.caip2).expect("fast rail present");
        assert_eq!(chain.rail, Rail::Fast);
    }

    #[test]
    fn lookup_unknown_caip2_is_none() {
        assert!(lookup("eip155:999999999").is_none());
    }
}
