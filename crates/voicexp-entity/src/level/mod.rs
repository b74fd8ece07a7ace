//! Level (XP) domain entities.

pub mod model;

pub use model::{LevelKey, LevelRecord, LevelRoleRow, XpWriteRequest};
