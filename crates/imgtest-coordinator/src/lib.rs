//! imgtest-coordinator - Disposable cloud test environments
//!
//! Provisions an image, an SSH keypair and a compute instance against an
//! infrastructure API, hands the environment to a test, and guarantees that
//! everything the run created is torn down again, even when provisioning
//! fails partway through or a stage hangs.
//!
//! ## Modules
//!
//! - [`config`]: Immutable run inputs and stage timeout resolution
//! - [`handles`]: Ownership-tagged handles for provisioned resources
//! - [`infra`]: The infrastructure API boundary
//! - [`orchestrator`]: Stage pipeline, cleanup, export and the scoped lifecycle
//! - [`probe`]: TCP reachability check
//! - [`timeout`]: Per-stage deadlines with cancellation
//! - [`wait`]: Fixed-interval status polling

pub mod config;
pub mod error;
pub mod handles;
pub mod infra;
pub mod keyfile;
pub mod logging;
pub mod orchestrator;
pub mod probe;
pub mod timeout;
pub mod wait;

pub use config::{CleanupPolicy, EnvironmentSpec, ImageSource, ImageSpec, RunTimeouts};
pub use error::EnvError;
pub use infra::{InfraConnector, InfraError, InfraOperations};
pub use orchestrator::{CleanupReport, EnvironmentExport, Stage, TeardownReport, TestEnvironment};
pub use probe::wait_for_port;
