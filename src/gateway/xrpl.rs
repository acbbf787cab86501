//! XRPL Gateway
//!
//! Concrete `LedgerGateway` over the XRPL JSON-RPC API. Builds Payment
//! transactions (sign-and-submit with the configured wallet), verifies trust
//! lines for issued currencies, and retries transport-class failures up to a
//! fixed bound with a fixed backoff between attempts.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;

use super::payment::{
    xrp_to_drops, CurrencySpec, LedgerGateway, PaymentError, PaymentOutcome, PaymentRequest,
};

/// Endpoint responses that indicate a transient node condition worth
/// retrying, as opposed to a deterministic rejection.
const TRANSIENT_CODES: [&str; 4] = ["noCurrent", "noNetwork", "tooBusy", "overloaded"];

pub struct XrplGateway {
    http: reqwest::Client,
    config: LedgerConfig,
    /// Issued-currency codes whose trust line has already been verified on
    /// the paying account, to avoid re-checking on every claim.
    verified_trustlines: RwLock<HashSet<String>>,
}

impl XrplGateway {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("xrain-coordinator/0.1")
            .build()
            .context("Failed to create XRPL HTTP client")?;

        info!(
            endpoint = %config.active_endpoint(),
            test_mode = config.test_mode,
            "XRPL gateway ready"
        );

        Ok(Self {
            http,
            config,
            verified_trustlines: RwLock::new(HashSet::new()),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, AttemptError> {
        let body = json!({ "method": method, "params": [params] });
        let response = self
            .http
            .post(self.config.active_endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AttemptError::Transient(format!("{} transport error: {}", method, e))
                } else {
                    // Request-level failures (bad scheme, redirect policy)
                    // are deterministic; retrying cannot help.
                    AttemptError::Terminal(PaymentError::Invalid {
                        reason: format!("{} request error: {}", method, e),
                    })
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }
        if !status.is_success() {
            return Err(AttemptError::Terminal(PaymentError::Rejected {
                code: format!("http_{}", status.as_u16()),
            }));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| AttemptError::Transient(format!("{} body error: {}", method, e)))?;

        let result = value.get("result").cloned().unwrap_or(Value::Null);
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            if TRANSIENT_CODES.contains(&error) {
                return Err(AttemptError::Transient(format!(
                    "endpoint not ready: {}",
                    error
                )));
            }
            return Err(AttemptError::Terminal(PaymentError::Rejected {
                code: error.to_string(),
            }));
        }

        Ok(result)
    }

    /// Verify the paying account holds a trust line for the issued currency.
    /// Absence is terminal; the result is cached per currency code.
    async fn ensure_trustline(&self, code: &str, issuer: &str) -> Result<(), AttemptError> {
        {
            let verified = self.verified_trustlines.read().await;
            if verified.contains(code) {
                return Ok(());
            }
        }

        debug!(currency = %code, "Checking trust line on paying account");
        let result = self
            .rpc_call(
                "account_lines",
                json!({ "account": self.config.wallet_address }),
            )
            .await?;

        let found = result
            .get("lines")
            .and_then(Value::as_array)
            .map(|lines| {
                lines.iter().any(|line| {
                    line.get("currency").and_then(Value::as_str) == Some(code)
                        && line.get("account").and_then(Value::as_str) == Some(issuer)
                })
            })
            .unwrap_or(false);

        if !found {
            return Err(AttemptError::Terminal(PaymentError::TrustlineMissing));
        }

        let mut verified = self.verified_trustlines.write().await;
        verified.insert(code.to_string());
        debug!(currency = %code, "Trust line verified");
        Ok(())
    }

    fn build_tx_json(&self, request: &PaymentRequest) -> Result<Value, PaymentError> {
        let amount = match &request.currency {
            CurrencySpec::Native => json!(xrp_to_drops(request.amount)?.to_string()),
            CurrencySpec::Issued { code, issuer } => json!({
                "currency": code,
                "value": format_issued_amount(request.amount),
                "issuer": issuer,
            }),
        };

        let mut tx = json!({
            "TransactionType": "Payment",
            "Account": self.config.wallet_address,
            "Destination": request.destination,
            "Amount": amount,
        });

        if let Some(memo) = &request.memo {
            tx["Memos"] = json!([{
                "Memo": { "MemoData": hex::encode(memo.as_bytes()) }
            }]);
        }

        Ok(tx)
    }

    async fn submit_once(&self, tx_json: &Value) -> Result<Option<String>, AttemptError> {
        let result = self
            .rpc_call(
                "submit",
                json!({
                    "tx_json": tx_json,
                    "secret": self.config.wallet_seed,
                    "fail_hard": true,
                }),
            )
            .await?;

        let engine = result
            .get("engine_result")
            .and_then(Value::as_str)
            .unwrap_or("");
        let tx_hash = result
            .get("tx_json")
            .and_then(|t| t.get("hash"))
            .and_then(Value::as_str)
            .map(str::to_string);

        match engine {
            "tesSUCCESS" => Ok(tx_hash),
            code if TRANSIENT_CODES.contains(&code) => {
                Err(AttemptError::Transient(format!("engine result: {}", code)))
            }
            code => Err(AttemptError::Terminal(PaymentError::Rejected {
                code: code.to_string(),
            })),
        }
    }

    /// Poll until the transaction is validated in a closed ledger. Accepted
    /// transactions that outlive the polling budget still count as submitted;
    /// reconciliation happens by memo.
    async fn wait_for_validation(&self, tx_hash: &str) {
        for _ in 0..self.config.validation_poll_attempts {
            match self
                .rpc_call("tx", json!({ "transaction": tx_hash, "binary": false }))
                .await
            {
                Ok(result) => {
                    if result.get("validated").and_then(Value::as_bool) == Some(true) {
                        debug!(tx_hash = %tx_hash, "Transaction validated");
                        return;
                    }
                }
                Err(e) => {
                    debug!(tx_hash = %tx_hash, error = ?e, "Validation poll failed");
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.config.validation_poll_interval_ms,
            ))
            .await;
        }
        warn!(tx_hash = %tx_hash, "Validation not observed within polling budget");
    }
}

#[async_trait]
impl LedgerGateway for XrplGateway {
    async fn submit(&self, request: &PaymentRequest) -> PaymentOutcome {
        let tx_json = match self.build_tx_json(request) {
            Ok(tx) => tx,
            Err(error) => return PaymentOutcome::Failed { error, attempts: 0 },
        };

        let max_attempts = self.config.max_attempts;
        let backoff = Duration::from_secs(self.config.backoff_secs);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(
                destination = %request.destination,
                amount = request.amount,
                currency = %request.currency.describe(),
                attempt = attempts,
                "Submitting payment"
            );

            let attempt = async {
                if let CurrencySpec::Issued { code, issuer } = &request.currency {
                    self.ensure_trustline(code, issuer).await?;
                }
                self.submit_once(&tx_json).await
            }
            .await;

            match attempt {
                Ok(tx_hash) => {
                    if let Some(hash) = &tx_hash {
                        self.wait_for_validation(hash).await;
                    }
                    info!(
                        destination = %request.destination,
                        amount = request.amount,
                        tx_hash = ?tx_hash,
                        attempts,
                        "Payment submitted"
                    );
                    return PaymentOutcome::Submitted { tx_hash, attempts };
                }
                Err(AttemptError::Terminal(error)) => {
                    warn!(
                        destination = %request.destination,
                        error = %error,
                        attempts,
                        "Payment rejected"
                    );
                    return PaymentOutcome::Failed { error, attempts };
                }
                Err(AttemptError::Transient(detail)) if attempts < max_attempts => {
                    warn!(
                        destination = %request.destination,
                        attempt = attempts,
                        detail = %detail,
                        "Transient submission failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(AttemptError::Transient(detail)) => {
                    warn!(
                        destination = %request.destination,
                        attempts,
                        detail = %detail,
                        "Payment failed after exhausting retries"
                    );
                    return PaymentOutcome::Failed {
                        error: PaymentError::ConnectionExhausted { attempts },
                        attempts,
                    };
                }
            }
        }
    }

    async fn query_external_balance(
        &self,
        identity: &str,
        token: &str,
    ) -> Result<Option<f64>, PaymentError> {
        let result = self
            .rpc_call("account_lines", json!({ "account": identity }))
            .await
            .map_err(|e| match e {
                AttemptError::Terminal(err) => err,
                AttemptError::Transient(_) => PaymentError::ConnectionExhausted { attempts: 1 },
            })?;

        let balance = result
            .get("lines")
            .and_then(Value::as_array)
            .and_then(|lines| {
                lines
                    .iter()
                    .find(|line| line.get("currency").and_then(Value::as_str) == Some(token))
            })
            .and_then(|line| line.get("balance").and_then(Value::as_str))
            .and_then(|raw| raw.parse::<f64>().ok());

        Ok(balance)
    }
}

/// Failure of one submission attempt, before retry classification collapses
/// it into a `PaymentOutcome`.
#[derive(Debug)]
enum AttemptError {
    /// Transport-class; eligible for retry within the attempt budget.
    Transient(String),
    /// Deterministic; surfaces immediately without retry.
    Terminal(PaymentError),
}

/// Issued amounts go on the wire as decimal strings.
fn format_issued_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_code_classification() {
        assert!(TRANSIENT_CODES.contains(&"noCurrent"));
        assert!(TRANSIENT_CODES.contains(&"tooBusy"));
        assert!(!TRANSIENT_CODES.contains(&"tecPATH_DRY"));
        assert!(!TRANSIENT_CODES.contains(&"temMALFORMED"));
    }

    #[test]
    fn test_issued_amount_formatting() {
        assert_eq!(format_issued_amount(10.0), "10");
        assert_eq!(format_issued_amount(2.5), "2.5");
    }
}
