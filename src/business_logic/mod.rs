pub mod analyzer;
pub mod config;
pub mod entry;
pub mod pivot;
pub mod pullback;
pub mod stage;
