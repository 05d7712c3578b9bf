//! Payment, rate-limit, timeout, and dev-bypass middlewares.
//!
//! Each middleware annotates the request via `req.extensions_mut().insert(...)`, the
//! same request-context-annotation style used by the request-id middleware.

pub mod dev_bypass;
pub mod facilitator_mw;
pub mod fast_rail;
pub mod rate_limit;
pub mod timeout;

/// Carried in request extensions once a payment has been accepted by any rail.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    /// Rail-native payer address, as a string (hex for EVM rails, base58 for Solana).
    pub payer: String,
    pub caip2: String,
    pub amount_base_units: String,
    pub proof_ref: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Verified directly against an on-chain receipt (fast rail).
    Direct,
    /// Verified via the external facilitator (slow rails).
    Facilitator,
}

/// Present when the dev-bypass header matched; skips all payment middlewares.
#[derive(Debug, Clone, Copy)]
pub struct DevBypassed;
