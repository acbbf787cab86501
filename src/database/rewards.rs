//! Reward Repository - PostgreSQL operations for reward accounts using sqlx

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::claim::{AssetRef, StoreError};
use crate::eligibility::{RewardAccount, RewardKind};

pub struct RewardRepository {
    pool: PgPool,
}

impl RewardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_account(&self, identity: &str) -> Result<Option<RewardAccount>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT identity, daily_anchor, biweekly_anchor, trait_anchor, amm_anchor,
                   reputation_flag, trait_flag, biweekly_amount, trait_amount
            FROM rewards.accounts
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| RewardAccount {
            identity: row.get("identity"),
            daily_anchor: row.get("daily_anchor"),
            biweekly_anchor: row.get("biweekly_anchor"),
            trait_anchor: row.get("trait_anchor"),
            amm_anchor: row.get("amm_anchor"),
            reputation_flag: row.get("reputation_flag"),
            trait_flag: row.get("trait_flag"),
            biweekly_amount: row.get("biweekly_amount"),
            trait_amount: row.get("trait_amount"),
        }))
    }

    /// Accrued daily payout: the sum over the identity's asset rows.
    pub async fn get_daily_amount(&self, identity: &str) -> Result<f64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(payout), 0)::DOUBLE PRECISION AS amount
            FROM rewards.assets
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("amount"))
    }

    /// One owned asset picked uniformly at random among the identity's rows.
    pub async fn get_random_asset(&self, identity: &str) -> Result<Option<AssetRef>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT image_link, token_id, collection_id
            FROM rewards.assets
            WHERE identity = $1
            ORDER BY RANDOM()
            LIMIT 1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| AssetRef {
            image_link: row.get("image_link"),
            token_id: row.get("token_id"),
            collection_id: row.get("collection_id"),
        }))
    }

    /// Conditionally advance the cooldown anchor for (identity, kind).
    ///
    /// The update applies only while the stored anchor still equals
    /// `observed` and the new anchor moves forward in time, so of any number
    /// of racing claims exactly one can win. Returns false on a lost race.
    pub async fn compare_and_set_anchor(
        &self,
        identity: &str,
        kind: RewardKind,
        anchor: DateTime<Utc>,
        observed: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let column = anchor_column(kind);
        let sql = format!(
            r#"
            UPDATE rewards.accounts
            SET {column} = $2
            WHERE identity = $1
              AND {column} IS NOT DISTINCT FROM $3
              AND $2 > COALESCE({column}, 'epoch'::timestamptz)
            "#,
        );

        let result = sqlx::query(&sql)
            .bind(identity)
            .bind(anchor)
            .bind(observed)
            .execute(&self.pool)
            .await?;

        let committed = result.rows_affected() == 1;
        debug!(
            identity = %identity,
            kind = %kind,
            anchor = %anchor,
            committed,
            "Anchor commit"
        );
        Ok(committed)
    }

    /// Set the disqualifying flag for `kind`. Returns true only when this
    /// call flipped it; kinds without a flag always return false.
    pub async fn set_flag(&self, identity: &str, kind: RewardKind) -> Result<bool, StoreError> {
        let column = match flag_column(kind) {
            Some(column) => column,
            None => return Ok(false),
        };

        let sql = format!(
            "UPDATE rewards.accounts SET {column} = TRUE WHERE identity = $1 AND {column} = FALSE"
        );
        let result = sqlx::query(&sql).bind(identity).execute(&self.pool).await?;

        Ok(result.rows_affected() == 1)
    }
}

fn anchor_column(kind: RewardKind) -> &'static str {
    match kind {
        RewardKind::Daily => "daily_anchor",
        RewardKind::Biweekly => "biweekly_anchor",
        RewardKind::TraitPenalty => "trait_anchor",
        RewardKind::AmmBonus => "amm_anchor",
    }
}

fn flag_column(kind: RewardKind) -> Option<&'static str> {
    match kind {
        RewardKind::Biweekly => Some("reputation_flag"),
        RewardKind::TraitPenalty => Some("trait_flag"),
        RewardKind::Daily | RewardKind::AmmBonus => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_column_covers_all_kinds() {
        for kind in RewardKind::all() {
            assert!(anchor_column(kind).ends_with("_anchor"));
        }
    }

    #[test]
    fn test_flag_column_only_for_flagged_kinds() {
        assert_eq!(flag_column(RewardKind::Biweekly), Some("reputation_flag"));
        assert_eq!(flag_column(RewardKind::TraitPenalty), Some("trait_flag"));
        assert_eq!(flag_column(RewardKind::Daily), None);
        assert_eq!(flag_column(RewardKind::AmmBonus), None);
    }
}
