//! Payment Gateway
//!
//! Submits value transfers to the external XRPL network and answers balance
//! queries. The gateway owns transport-level retries; everything above it
//! sees a single resolved `PaymentOutcome` per submission.

mod payment;
mod xrpl;

pub use payment::{
    xrp_to_drops, CurrencySpec, LedgerGateway, PaymentError, PaymentOutcome, PaymentRequest,
};
pub use xrpl::XrplGateway;
