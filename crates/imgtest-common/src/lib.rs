//! imgtest-common - Shared types and utilities
//!
//! Types shared by the coordinator and its test utilities, kept free of
//! runtime and infrastructure dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default stage timeouts and polling intervals
//! - [`naming`]: Unique names for per-run test resources
//! - [`resource_kind`]: Provisioned resource kinds and cleanup ordering

pub mod defaults;
pub mod naming;
pub mod resource_kind;

pub use naming::make_test_name;
pub use resource_kind::{CLEANUP_ORDER, ResourceKind};
