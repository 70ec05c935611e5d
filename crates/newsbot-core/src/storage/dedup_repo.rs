use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::dedup::DedupState;
use crate::error::StoreError;
use crate::feed::FeedId;

/// Repository for the per-feed "last dispatched article" row
pub struct DedupRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedHistoryRow {
    last_published_at: DateTime<Utc>,
    last_link: String,
}

impl From<FeedHistoryRow> for DedupState {
    fn from(row: FeedHistoryRow) -> Self {
        DedupState {
            published_at: row.last_published_at,
            link: row.last_link,
        }
    }
}

impl<'a> DedupRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, feed_id: FeedId) -> Result<Option<DedupState>, StoreError> {
        let row: Option<FeedHistoryRow> = with_retry("get_dedup_state", || {
            sqlx::query_as(
                r#"
                SELECT last_published_at, last_link
                FROM feed_history
                WHERE feed_id = ?
                "#,
            )
            .bind(feed_id)
            .fetch_optional(self.db.pool())
        })
        .await?;

        Ok(row.map(DedupState::from))
    }

    /// Upsert timestamp and link in a single statement
    pub async fn set(&self, feed_id: FeedId, state: &DedupState) -> Result<(), StoreError> {
        let now = Utc::now();

        with_retry("set_dedup_state", || {
            sqlx::query(
                r#"
                INSERT INTO feed_history (feed_id, last_published_at, last_link, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(feed_id) DO UPDATE SET
                    last_published_at = excluded.last_published_at,
                    last_link = excluded.last_link,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(feed_id)
            .bind(state.published_at)
            .bind(&state.link)
            .bind(now)
            .execute(self.db.pool())
        })
        .await?;

        Ok(())
    }
}
