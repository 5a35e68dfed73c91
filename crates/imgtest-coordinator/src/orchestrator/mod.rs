//! Environment orchestration
//!
//! - [`pipeline`]: the provisioning stages
//! - [`cleanup`]: ordered, idempotent teardown
//! - [`export`]: flat description of a ready environment
//! - [`report`]: resources left behind after teardown
//! - [`lifecycle`]: the scoped [`TestEnvironment`] tying them together

pub mod cleanup;
pub mod export;
pub mod lifecycle;
pub mod pipeline;
pub mod report;
pub mod types;

pub use cleanup::{CleanupCoordinator, CleanupReport, CleanupResult};
pub use export::{EnvironmentExport, export_environment};
pub use lifecycle::TestEnvironment;
pub use pipeline::StagePipeline;
pub use report::{RemainingResource, TeardownReport, report_remaining};
pub use types::{ProvisionState, Stage};
