//! Quote Repository - collection flavor text attached to successful claims

use sqlx::{PgPool, Row};

use crate::claim::{ClaimQuote, StoreError};

/// Collection id whose quotes serve as the fallback pool.
const DEFAULT_COLLECTION: i64 = 0;

pub struct QuoteRepository {
    pool: PgPool,
}

impl QuoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One quote picked at random for the collection, falling back to the
    /// default pool when the collection has none.
    pub async fn get_random_quote(
        &self,
        collection_id: i64,
    ) -> Result<Option<ClaimQuote>, StoreError> {
        if let Some(quote) = self.pick_for(collection_id).await? {
            return Ok(Some(quote));
        }
        if collection_id != DEFAULT_COLLECTION {
            return self.pick_for(DEFAULT_COLLECTION).await;
        }
        Ok(None)
    }

    async fn pick_for(&self, collection_id: i64) -> Result<Option<ClaimQuote>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT group_name, description
            FROM rewards.quotes
            WHERE collection_id = $1
            ORDER BY RANDOM()
            LIMIT 1
            "#,
        )
        .bind(collection_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ClaimQuote {
            group_name: row.get("group_name"),
            description: row.get("description"),
        }))
    }
}
