//! Convenience result type alias for VoiceXP.

use crate::error::AppError;

/// A specialized `Result` type for VoiceXP operations.
pub type AppResult<T> = Result<T, AppError>;
