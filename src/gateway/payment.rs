//! Payment Types and Gateway Contract
//!
//! Tagged request/outcome types for payment submission. `PaymentOutcome`
//! carries no partial state: after the gateway's bounded retry it is either
//! `Submitted` or `Failed` with a classified error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What currency a payment moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencySpec {
    /// The network's native unit; amounts are converted to drops.
    Native,
    /// An issued token. Requires a trust line resolvable from the paying
    /// account; its absence is terminal, never retried.
    Issued { code: String, issuer: String },
}

impl CurrencySpec {
    pub fn describe(&self) -> &str {
        match self {
            CurrencySpec::Native => "XRP",
            CurrencySpec::Issued { code, .. } => code,
        }
    }
}

/// One value transfer to submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub destination: String,
    pub amount: f64,
    pub currency: CurrencySpec,
    /// Idempotency token carried on-chain; a resubmission of the same
    /// logical claim reuses it so operators can reconcile by memo.
    pub memo: Option<String>,
}

/// Classified payment failure. Transport-class variants were already retried
/// inside the gateway before surfacing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PaymentError {
    #[error("no trust line for the issued currency on the paying account")]
    TrustlineMissing,
    #[error("connection attempts exhausted after {attempts} tries")]
    ConnectionExhausted { attempts: u32 },
    #[error("transaction rejected by the network: {code}")]
    Rejected { code: String },
    #[error("invalid payment request: {reason}")]
    Invalid { reason: String },
}

impl PaymentError {
    /// Transport-class failures are worth retrying later; deterministic
    /// rejections and configuration issues are not.
    pub fn is_retryable_later(&self) -> bool {
        matches!(self, PaymentError::ConnectionExhausted { .. })
    }
}

/// Resolved result of one `submit` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Submitted {
        tx_hash: Option<String>,
        attempts: u32,
    },
    Failed {
        error: PaymentError,
        attempts: u32,
    },
}

impl PaymentOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, PaymentOutcome::Submitted { .. })
    }
}

/// Boundary to the external payment network.
///
/// `submit` may block for the duration of network round-trips (bounded by
/// retry count times backoff); callers treat it as a long-running call and
/// must not resubmit on ambiguous outcomes without checking the ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn submit(&self, request: &PaymentRequest) -> PaymentOutcome;

    /// Balance of `token` held by `identity` on the external network, or
    /// `None` when the identity holds no such token.
    async fn query_external_balance(
        &self,
        identity: &str,
        token: &str,
    ) -> Result<Option<f64>, PaymentError>;
}

/// Convert a native-unit amount to drops (1 XRP = 1_000_000 drops).
pub fn xrp_to_drops(amount: f64) -> Result<u64, PaymentError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(PaymentError::Invalid {
            reason: format!("amount {} is not a valid XRP value", amount),
        });
    }
    let drops = (amount * 1_000_000.0).round();
    if drops > u64::MAX as f64 {
        return Err(PaymentError::Invalid {
            reason: format!("amount {} overflows drops", amount),
        });
    }
    Ok(drops as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xrp_to_drops() {
        assert_eq!(xrp_to_drops(1.0).unwrap(), 1_000_000);
        assert_eq!(xrp_to_drops(0.000001).unwrap(), 1);
        assert_eq!(xrp_to_drops(12.5).unwrap(), 12_500_000);
    }

    #[test]
    fn test_xrp_to_drops_rejects_invalid() {
        assert!(xrp_to_drops(-1.0).is_err());
        assert!(xrp_to_drops(f64::NAN).is_err());
        assert!(xrp_to_drops(f64::INFINITY).is_err());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(PaymentError::ConnectionExhausted { attempts: 3 }.is_retryable_later());
        assert!(!PaymentError::TrustlineMissing.is_retryable_later());
        assert!(!PaymentError::Rejected {
            code: "tecPATH_DRY".to_string()
        }
        .is_retryable_later());
    }
}
