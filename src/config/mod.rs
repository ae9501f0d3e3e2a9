/// Database configuration and connection management
pub mod database;

/// Operator capability configuration from environment variables
pub mod operators;

/// Application settings loaded from config.toml
pub mod settings;
