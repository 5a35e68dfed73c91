//! Types for orchestration

use crate::handles::HandleSet;
use crate::keyfile::PrivateKeyFile;
use std::fmt;

/// Provisioning stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Create the SSH keypair
    CreateKeypair,
    /// Upload the image (skipped for override images)
    UploadImage,
    /// Boot the instance
    SpawnInstance,
    /// Wait for the instance to report ACTIVE
    WaitActive,
    /// Resolve the instance's main address
    DiscoverAddress,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 5] = [
        Stage::CreateKeypair,
        Stage::UploadImage,
        Stage::SpawnInstance,
        Stage::WaitActive,
        Stage::DiscoverAddress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::CreateKeypair => "create keypair",
            Stage::UploadImage => "upload image",
            Stage::SpawnInstance => "spawn instance",
            Stage::WaitActive => "wait for active",
            Stage::DiscoverAddress => "discover address",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run has produced so far.
///
/// Populated stage by stage; cleanup and reporting read it back. It always
/// reflects what actually exists, including after a failed stage.
#[derive(Debug, Default)]
pub struct ProvisionState {
    pub handles: HandleSet,
    /// Last stage that completed successfully
    pub completed: Option<Stage>,
    /// Main address discovered in the final stage
    pub main_ip: Option<String>,
    /// Private key of the run's keypair, written to disk
    pub private_key: Option<PrivateKeyFile>,
}

impl ProvisionState {
    /// Record a completed stage
    pub(crate) fn mark_completed(&mut self, stage: Stage) {
        self.completed = Some(stage);
    }

    /// Whether every stage has completed
    pub fn is_ready(&self) -> bool {
        self.completed == Some(Stage::DiscoverAddress) && self.main_ip.is_some()
    }
}
