//! Level record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use voicexp_core::types::id::{GuildId, RoleId, UserId};

/// Composite key of a participant's level record within a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelKey {
    /// Guild the record belongs to.
    pub guild_id: GuildId,
    /// Participant the record belongs to.
    pub user_id: UserId,
}

impl LevelKey {
    /// Build a key.
    pub const fn new(guild_id: GuildId, user_id: UserId) -> Self {
        Self { guild_id, user_id }
    }
}

impl std::fmt::Display for LevelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.user_id)
    }
}

/// Persisted progression of one participant in one guild (`levels` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LevelRecord {
    /// XP accumulated towards the next level.
    pub xp: i64,
    /// Current level, starting at 1.
    pub level: i32,
    /// When XP was last credited by the cooldown-gated message path.
    pub last_xp_time: DateTime<Utc>,
    /// Last role granted for reaching a level.
    pub last_role: Option<RoleId>,
}

impl LevelRecord {
    /// The record of a participant that has never earned anything.
    pub fn starting(now: DateTime<Utc>, initial_role: Option<RoleId>) -> Self {
        Self {
            xp: 0,
            level: 1,
            last_xp_time: now,
            last_role: initial_role,
        }
    }
}

/// A queued write of a level record, consumed by the batch flusher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpWriteRequest {
    /// Guild of the record.
    pub guild_id: GuildId,
    /// Participant of the record.
    pub user_id: UserId,
    /// New XP value.
    pub xp: i64,
    /// New level.
    pub level: i32,
    /// New last-XP timestamp.
    pub last_xp_time: DateTime<Utc>,
    /// New last granted role.
    pub last_role: Option<RoleId>,
}

impl XpWriteRequest {
    /// Build a request that writes `record` under `key`.
    pub fn from_record(key: LevelKey, record: &LevelRecord) -> Self {
        Self {
            guild_id: key.guild_id,
            user_id: key.user_id,
            xp: record.xp,
            level: record.level,
            last_xp_time: record.last_xp_time,
            last_role: record.last_role,
        }
    }

    /// Key of the record this request writes.
    pub fn key(&self) -> LevelKey {
        LevelKey::new(self.guild_id, self.user_id)
    }

    /// The record value this request writes.
    pub fn record(&self) -> LevelRecord {
        LevelRecord {
            xp: self.xp,
            level: self.level,
            last_xp_time: self.last_xp_time,
            last_role: self.last_role,
        }
    }
}

/// One row of the `level_roles` mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LevelRoleRow {
    /// Level at which the role is granted.
    pub level: i32,
    /// Role granted.
    pub role_id: RoleId,
}
