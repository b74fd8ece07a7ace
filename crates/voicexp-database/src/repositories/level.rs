//! Level repository implementation.

use std::sync::Arc;

use sqlx::{Postgres, QueryBuilder};

use voicexp_core::result::AppResult;
use voicexp_entity::level::{LevelKey, LevelRecord, XpWriteRequest};

use crate::connection::DatabasePool;
use crate::error::classify;

/// Repository for the `levels` table.
#[derive(Debug, Clone)]
pub struct LevelRepository {
    db: Arc<DatabasePool>,
}

impl LevelRepository {
    /// Create a new level repository.
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self { db }
    }

    /// Find the record of a participant.
    pub async fn find(&self, key: LevelKey) -> AppResult<Option<LevelRecord>> {
        sqlx::query_as::<_, LevelRecord>(
            "SELECT xp, level, last_xp_time, last_role FROM levels \
             WHERE guild_id = $1 AND user_id = $2",
        )
        .bind(key.guild_id)
        .bind(key.user_id)
        .fetch_optional(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to find level"))
    }

    /// Upsert a batch of already de-duplicated requests in one statement.
    pub async fn upsert_batch(&self, batch: &[XpWriteRequest]) -> AppResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO levels (guild_id, user_id, xp, level, last_xp_time, last_role) ",
        );
        builder.push_values(batch, |mut row, request| {
            row.push_bind(request.guild_id)
                .push_bind(request.user_id)
                .push_bind(request.xp)
                .push_bind(request.level)
                .push_bind(request.last_xp_time)
                .push_bind(request.last_role);
        });
        builder.push(
            " ON CONFLICT (guild_id, user_id) DO UPDATE SET \
             xp = EXCLUDED.xp, level = EXCLUDED.level, \
             last_xp_time = EXCLUDED.last_xp_time, last_role = EXCLUDED.last_role",
        );

        let result = builder
            .build()
            .execute(&self.db.pool())
            .await
            .map_err(|e| classify(e, "Failed to upsert levels"))?;
        Ok(result.rows_affected())
    }
}
