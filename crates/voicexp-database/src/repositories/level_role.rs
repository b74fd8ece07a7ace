//! Level role mapping repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use voicexp_core::result::AppResult;
use voicexp_core::types::id::{GuildId, RoleId};
use voicexp_entity::level::LevelRoleRow;

use crate::connection::DatabasePool;
use crate::error::classify;

/// Repository for the `level_roles` table.
#[derive(Debug, Clone)]
pub struct LevelRoleRepository {
    db: Arc<DatabasePool>,
}

impl LevelRoleRepository {
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self { db }
    }

    /// Level to role mapping of a guild.
    pub async fn mapping(&self, guild_id: GuildId) -> AppResult<BTreeMap<i32, RoleId>> {
        let rows = sqlx::query_as::<_, LevelRoleRow>(
            "SELECT level, role_id FROM level_roles WHERE guild_id = $1 ORDER BY level",
        )
        .bind(guild_id)
        .fetch_all(&self.db.pool())
        .await
        .map_err(|e| classify(e, "Failed to load level roles"))?;

        Ok(rows.into_iter().map(|row| (row.level, row.role_id)).collect())
    }
}
