//! Database Connection Pool using sqlx

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::claim::{
    ClaimPayload, ClaimQuote, CommitResult, PayloadLookup, RewardStore, StoreError,
};
use crate::config::DatabaseConfig;
use crate::database::quotes::QuoteRepository;
use crate::database::rewards::RewardRepository;
use crate::eligibility::{RewardAccount, RewardKind};

pub struct DatabasePool {
    pool: PgPool,
    rewards: RewardRepository,
    quotes: QuoteRepository,
}

impl DatabasePool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        info!("Connected to PostgreSQL");

        let rewards = RewardRepository::new(pool.clone());
        let quotes = QuoteRepository::new(pool.clone());

        Ok(Self {
            pool,
            rewards,
            quotes,
        })
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        info!("Initializing database schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS rewards")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rewards.accounts (
                identity TEXT PRIMARY KEY,
                daily_anchor TIMESTAMPTZ,
                biweekly_anchor TIMESTAMPTZ,
                trait_anchor TIMESTAMPTZ,
                amm_anchor TIMESTAMPTZ,
                reputation_flag BOOLEAN NOT NULL DEFAULT FALSE,
                trait_flag BOOLEAN NOT NULL DEFAULT FALSE,
                biweekly_amount BIGINT NOT NULL DEFAULT 0,
                trait_amount BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rewards.assets (
                id BIGSERIAL PRIMARY KEY,
                identity TEXT NOT NULL,
                token_id TEXT NOT NULL,
                image_link TEXT NOT NULL,
                collection_id BIGINT NOT NULL,
                payout DOUBLE PRECISION NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS assets_identity_idx ON rewards.assets (identity)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rewards.quotes (
                id BIGSERIAL PRIMARY KEY,
                collection_id BIGINT NOT NULL,
                group_name TEXT NOT NULL,
                description TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn rewards(&self) -> &RewardRepository {
        &self.rewards
    }

    pub fn quotes(&self) -> &QuoteRepository {
        &self.quotes
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RewardStore for DatabasePool {
    async fn eligibility_snapshot(
        &self,
        identity: &str,
    ) -> Result<Option<RewardAccount>, StoreError> {
        self.rewards.get_account(identity).await
    }

    async fn claim_payload(
        &self,
        identity: &str,
        kind: RewardKind,
    ) -> Result<PayloadLookup, StoreError> {
        let account = match self.rewards.get_account(identity).await? {
            Some(account) => account,
            None => return Ok(PayloadLookup::IdentityNotFound),
        };

        let asset = self.rewards.get_random_asset(identity).await?;

        match kind {
            RewardKind::Daily => {
                // The daily claim is presented against a random owned asset;
                // an identity holding none cannot claim it.
                let asset = match asset {
                    Some(asset) => asset,
                    None => return Ok(PayloadLookup::NoAssetFound),
                };
                let amount = self.rewards.get_daily_amount(identity).await?;
                Ok(PayloadLookup::Found(ClaimPayload {
                    amount,
                    asset: Some(asset),
                }))
            }
            RewardKind::Biweekly => Ok(PayloadLookup::Found(ClaimPayload {
                amount: account.biweekly_amount as f64,
                asset,
            })),
            RewardKind::TraitPenalty => Ok(PayloadLookup::Found(ClaimPayload {
                amount: account.trait_amount.min(1) as f64,
                asset,
            })),
            // The AMM bonus amount comes from external holdings, not the
            // store; only the asset reference is useful here.
            RewardKind::AmmBonus => Ok(PayloadLookup::Found(ClaimPayload { amount: 0.0, asset })),
        }
    }

    async fn commit_claim(
        &self,
        identity: &str,
        kind: RewardKind,
        anchor: DateTime<Utc>,
        observed: Option<DateTime<Utc>>,
    ) -> Result<CommitResult, StoreError> {
        let committed = self
            .rewards
            .compare_and_set_anchor(identity, kind, anchor, observed)
            .await?;
        Ok(if committed {
            CommitResult::Committed
        } else {
            CommitResult::Conflict
        })
    }

    async fn set_disqualifying_flag(
        &self,
        identity: &str,
        kind: RewardKind,
    ) -> Result<bool, StoreError> {
        self.rewards.set_flag(identity, kind).await
    }

    async fn claim_quote(&self, collection_id: i64) -> Result<Option<ClaimQuote>, StoreError> {
        self.quotes.get_random_quote(collection_id).await
    }
}
