//! Cache configuration.

use serde::{Deserialize, Serialize};

/// In-process cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached level records.
    #[serde(default = "default_level_capacity")]
    pub level_capacity: u64,
    /// Time-to-live for cached level records in seconds.
    #[serde(default = "default_ttl")]
    pub level_ttl_seconds: u64,
    /// Time-to-live for cached level-role mappings in seconds.
    #[serde(default = "default_ttl")]
    pub role_ttl_seconds: u64,
    /// Time-to-live for cached boost event windows in seconds.
    #[serde(default = "default_ttl")]
    pub boost_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            level_capacity: default_level_capacity(),
            level_ttl_seconds: default_ttl(),
            role_ttl_seconds: default_ttl(),
            boost_ttl_seconds: default_ttl(),
        }
    }
}

fn default_level_capacity() -> u64 {
    1000
}

fn default_ttl() -> u64 {
    300
}
