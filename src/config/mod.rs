/// Database configuration and connection management
pub mod database;

/// Engine settings loaded from config.toml
pub mod engine;
