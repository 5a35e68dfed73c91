//! Errors surfaced by a test environment run

use crate::orchestrator::Stage;
use thiserror::Error;

/// Failure kinds of a test environment run
///
/// Stage failures are returned only after cleanup has already run, so the
/// caller receives the error with the run's resources gone (or reported).
#[derive(Debug, Error)]
pub enum EnvError {
    /// A stage exceeded its deadline
    #[error("Timeout: '{stage}' did not finish within {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    /// The instance reached a status it cannot recover from
    #[error("Instance {id} state is '{status}' (expected 'ACTIVE')")]
    Instance { id: String, status: String },

    /// The infrastructure API could not be reached or rejected the credentials
    #[error("Failed to connect to the infrastructure API")]
    Connection(#[source] anyhow::Error),

    /// An operation was requested before the environment was ready
    #[error("Environment is not ready: {0}")]
    Precondition(String),

    /// An infrastructure API call failed during a stage
    #[error("Stage '{stage}' failed")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// The private key could not be written to disk
    #[error("Failed to save private key file")]
    PrivateKey(#[source] std::io::Error),

    /// Instance metadata could not be fetched for the export
    #[error("Failed to collect environment metadata")]
    Export(#[source] anyhow::Error),
}

impl EnvError {
    /// Wrap an API error raised inside `stage`
    pub fn stage(stage: Stage, source: anyhow::Error) -> Self {
        Self::Stage { stage, source }
    }

    /// Check if this is a stage timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnvError::Timeout { .. })
    }

    /// The stage this error belongs to, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            EnvError::Timeout { stage, .. } | EnvError::Stage { stage, .. } => Some(*stage),
            EnvError::Instance { .. } => Some(Stage::WaitActive),
            _ => None,
        }
    }
}
