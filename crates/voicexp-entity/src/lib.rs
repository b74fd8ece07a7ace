//! # voicexp-entity
//!
//! Domain entity models for VoiceXP. Structs that mirror a database row
//! derive `sqlx::FromRow`; the presence types are in-memory value objects.

pub mod boost;
pub mod level;
pub mod presence;
