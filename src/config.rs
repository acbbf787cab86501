use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;
use url::Url;

use crate::eligibility::{CooldownSchedule, RewardKind};
use crate::gateway::CurrencySpec;

/// Configuration for the reward-claim coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Ledger network configuration
    pub ledger: LedgerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Reward schedule configuration
    pub rewards: RewardsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the production network
    pub endpoint_url: String,
    /// JSON-RPC endpoint of the test network
    pub testnet_endpoint_url: String,
    /// When true, all submissions go to the test network
    pub test_mode: bool,
    /// Classic address of the paying wallet
    pub wallet_address: String,
    /// Wallet seed - MUST come from the environment, never from files
    pub wallet_seed: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total submission attempts (first try included)
    pub max_attempts: u32,
    /// Fixed backoff between attempts, in seconds
    pub backoff_secs: u64,
    /// How many times to poll for ledger validation of an accepted tx
    pub validation_poll_attempts: u32,
    /// Interval between validation polls, in milliseconds
    pub validation_poll_interval_ms: u64,
}

impl LedgerConfig {
    pub fn active_endpoint(&self) -> &str {
        if self.test_mode {
            &self.testnet_endpoint_url
        } else {
            &self.endpoint_url
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Connection pool size
    pub max_connections: u32,
}

/// Reward schedule and payout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Rolling cooldown for the daily bonus, in hours
    pub daily_cooldown_hours: i64,
    /// Fixed-hour cutoff for the periodic kinds (0-23)
    pub reset_hour: u32,
    /// Named time zone the cutoff hour is evaluated in
    pub reset_zone: String,
    /// Issued currency code for payouts; "XRP" or empty means native
    pub currency_code: String,
    /// Issuer account for the issued currency
    pub currency_issuer: String,
    /// Token whose external holdings drive the AMM bonus
    pub amm_token: String,
    /// Payout per unit held
    pub amm_rate: f64,
    /// Minimum holdings required for the AMM bonus
    pub amm_min_balance: f64,
    /// Seconds a caller must wait between claim requests
    pub claim_rate_limit_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8091,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://s1.ripple.com:51234/".to_string(),
            testnet_endpoint_url: "https://s.altnet.rippletest.net:51234/".to_string(),
            // Default to the test network so a misconfigured deployment
            // cannot move real funds.
            test_mode: true,
            wallet_address: String::new(),
            wallet_seed: String::new(),
            timeout_secs: 30,
            max_attempts: 3,
            backoff_secs: 5,
            validation_poll_attempts: 10,
            validation_poll_interval_ms: 1000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/xrain_rewards".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            daily_cooldown_hours: 24,
            reset_hour: 19,
            reset_zone: "UTC".to_string(),
            currency_code: "XRAIN".to_string(),
            currency_issuer: String::new(),
            amm_token: "XRAIN".to_string(),
            amm_rate: 0.01,
            amm_min_balance: 100.0,
            claim_rate_limit_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            database: DatabaseConfig::default(),
            rewards: RewardsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RewardsConfig {
    /// Cooldown schedule for a reward kind.
    pub fn schedule_for(&self, kind: RewardKind) -> CooldownSchedule {
        match kind {
            RewardKind::Daily => CooldownSchedule::rolling_hours(self.daily_cooldown_hours),
            RewardKind::Biweekly | RewardKind::TraitPenalty | RewardKind::AmmBonus => {
                CooldownSchedule::DailyCutoff {
                    hour: self.reset_hour,
                    zone: self.reset_zone_tz(),
                }
            }
        }
    }

    /// Currency payouts are denominated in.
    pub fn payout_currency(&self) -> CurrencySpec {
        if self.currency_code.is_empty() || self.currency_code.eq_ignore_ascii_case("XRP") {
            CurrencySpec::Native
        } else {
            CurrencySpec::Issued {
                code: self.currency_code.clone(),
                issuer: self.currency_issuer.clone(),
            }
        }
    }

    pub fn amm_token(&self) -> &str {
        &self.amm_token
    }

    fn reset_zone_tz(&self) -> Tz {
        // Parse errors are rejected by validate(); the fallback keeps the
        // schedule usable if the config was built without validation.
        self.reset_zone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("XRAIN_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("XRAIN_PORT") {
            config.server.port = port.parse().context("Invalid XRAIN_PORT value")?;
        }

        if let Ok(url) = env::var("XRAIN_LEDGER_ENDPOINT") {
            config.ledger.endpoint_url = url;
        }
        if let Ok(url) = env::var("XRAIN_LEDGER_TESTNET_ENDPOINT") {
            config.ledger.testnet_endpoint_url = url;
        }
        if let Ok(test_mode) = env::var("XRAIN_TEST_MODE") {
            config.ledger.test_mode = test_mode.parse().context("Invalid XRAIN_TEST_MODE value")?;
        }
        if let Ok(address) = env::var("XRAIN_WALLET_ADDRESS") {
            config.ledger.wallet_address = address;
        }
        config.ledger.wallet_seed = env::var("XRAIN_WALLET_SEED")
            .context("XRAIN_WALLET_SEED environment variable is required")?;
        if let Ok(timeout) = env::var("XRAIN_SUBMIT_TIMEOUT_SECS") {
            config.ledger.timeout_secs = timeout
                .parse()
                .context("Invalid XRAIN_SUBMIT_TIMEOUT_SECS value")?;
        }
        if let Ok(attempts) = env::var("XRAIN_SUBMIT_MAX_ATTEMPTS") {
            config.ledger.max_attempts = attempts
                .parse()
                .context("Invalid XRAIN_SUBMIT_MAX_ATTEMPTS value")?;
        }
        if let Ok(backoff) = env::var("XRAIN_SUBMIT_BACKOFF_SECS") {
            config.ledger.backoff_secs = backoff
                .parse()
                .context("Invalid XRAIN_SUBMIT_BACKOFF_SECS value")?;
        }

        if let Ok(url) = env::var("XRAIN_DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(max) = env::var("XRAIN_DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = max
                .parse()
                .context("Invalid XRAIN_DATABASE_MAX_CONNECTIONS value")?;
        }

        if let Ok(hours) = env::var("XRAIN_DAILY_COOLDOWN_HOURS") {
            config.rewards.daily_cooldown_hours = hours
                .parse()
                .context("Invalid XRAIN_DAILY_COOLDOWN_HOURS value")?;
        }
        if let Ok(hour) = env::var("XRAIN_RESET_HOUR") {
            config.rewards.reset_hour = hour.parse().context("Invalid XRAIN_RESET_HOUR value")?;
        }
        if let Ok(zone) = env::var("XRAIN_RESET_ZONE") {
            config.rewards.reset_zone = zone;
        }
        if let Ok(code) = env::var("XRAIN_CURRENCY_CODE") {
            config.rewards.currency_code = code;
        }
        if let Ok(issuer) = env::var("XRAIN_CURRENCY_ISSUER") {
            config.rewards.currency_issuer = issuer;
        }
        if let Ok(token) = env::var("XRAIN_AMM_TOKEN") {
            config.rewards.amm_token = token;
        }
        if let Ok(rate) = env::var("XRAIN_AMM_RATE") {
            config.rewards.amm_rate = rate.parse().context("Invalid XRAIN_AMM_RATE value")?;
        }
        if let Ok(min) = env::var("XRAIN_AMM_MIN_BALANCE") {
            config.rewards.amm_min_balance =
                min.parse().context("Invalid XRAIN_AMM_MIN_BALANCE value")?;
        }
        if let Ok(secs) = env::var("XRAIN_CLAIM_RATE_LIMIT_SECS") {
            config.rewards.claim_rate_limit_secs = secs
                .parse()
                .context("Invalid XRAIN_CLAIM_RATE_LIMIT_SECS value")?;
        }

        if let Ok(level) = env::var("XRAIN_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for consistency and payment safety.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        for endpoint in [&self.ledger.endpoint_url, &self.ledger.testnet_endpoint_url] {
            Url::parse(endpoint)
                .map_err(|e| anyhow::anyhow!("Invalid ledger endpoint {}: {}", endpoint, e))?;
        }
        if self.ledger.wallet_address.is_empty() {
            return Err(anyhow::anyhow!("Paying wallet address is required"));
        }
        if !self.ledger.wallet_address.starts_with('r') {
            return Err(anyhow::anyhow!(
                "Paying wallet address is not a classic ledger address: {}",
                sanitize_for_logging(&self.ledger.wallet_address)
            ));
        }
        if self.ledger.wallet_seed.is_empty() {
            return Err(anyhow::anyhow!("Paying wallet seed is required"));
        }
        if self.ledger.max_attempts == 0 {
            return Err(anyhow::anyhow!("Submission attempts must be at least 1"));
        }
        if !self.ledger.test_mode {
            warn!("Test mode disabled: submissions will move real funds");
        }

        if self.rewards.reset_hour > 23 {
            return Err(anyhow::anyhow!(
                "Reset hour must be 0-23, got {}",
                self.rewards.reset_hour
            ));
        }
        if self.rewards.reset_zone.parse::<Tz>().is_err() {
            return Err(anyhow::anyhow!(
                "Unknown reset time zone: {}",
                self.rewards.reset_zone
            ));
        }
        if self.rewards.daily_cooldown_hours <= 0 {
            return Err(anyhow::anyhow!("Daily cooldown must be positive"));
        }
        if let CurrencySpec::Issued { issuer, .. } = self.rewards.payout_currency() {
            if issuer.is_empty() {
                return Err(anyhow::anyhow!(
                    "Issued payout currency {} requires XRAIN_CURRENCY_ISSUER",
                    self.rewards.currency_code
                ));
            }
        }
        if self.rewards.amm_rate <= 0.0 {
            return Err(anyhow::anyhow!("AMM rate must be positive"));
        }

        Ok(())
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    if data.len() <= 8 {
        return "***".to_string();
    }
    format!("{}***{}", &data[..4], &data[data.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default();
        config.ledger.wallet_address = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh".to_string();
        config.ledger.wallet_seed = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb".to_string();
        config.rewards.currency_issuer = "rIssuer1111111111111111111111111".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_seed_fails() {
        let mut config = valid_config();
        config.ledger.wallet_seed.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_issued_currency_requires_issuer() {
        let mut config = valid_config();
        config.rewards.currency_issuer.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_zone_fails() {
        let mut config = valid_config();
        config.rewards.reset_zone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schedule_mapping() {
        let rewards = RewardsConfig::default();
        assert_eq!(
            rewards.schedule_for(RewardKind::Daily),
            CooldownSchedule::rolling_hours(24)
        );
        assert!(matches!(
            rewards.schedule_for(RewardKind::Biweekly),
            CooldownSchedule::DailyCutoff { hour: 19, .. }
        ));
    }

    #[test]
    fn test_native_payout_when_code_is_xrp() {
        let mut rewards = RewardsConfig::default();
        rewards.currency_code = "XRP".to_string();
        assert_eq!(rewards.payout_currency(), CurrencySpec::Native);
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("short"), "***");
        assert_eq!(
            sanitize_for_logging("snoPBrXtMeMyMHUVTgbuqAfg1SUTb"),
            "snoP***SUTb"
        );
    }
}
