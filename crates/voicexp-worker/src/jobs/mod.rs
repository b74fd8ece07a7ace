//! Built-in operation handlers.

pub mod award;

pub use award::AwardXpHandler;
