//! Error types for the Moai core.

use crate::onboarding::Checkpoint;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),

    #[error("State machine error: {0}")]
    Machine(#[from] MachineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Onboarding flow errors.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Invalid onboarding step {0}, expected 1-6")]
    InvalidStep(i64),

    #[error("Step {step} is locked until all previous steps are complete")]
    StepLocked { step: Checkpoint },

    #[error("No profile exists for user {user_id}")]
    ProfileNotFound { user_id: String },

    #[error("Profile fetch failed: {0}")]
    FetchFailed(String),
}

/// State machine runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("Machine {machine} has been stopped")]
    Stopped { machine: &'static str },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
