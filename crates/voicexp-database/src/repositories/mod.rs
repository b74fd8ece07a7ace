//! Repository implementations for VoiceXP tables.

pub mod boost;
pub mod level;
pub mod level_role;

pub use boost::BoostRepository;
pub use level::LevelRepository;
pub use level_role::LevelRoleRepository;
