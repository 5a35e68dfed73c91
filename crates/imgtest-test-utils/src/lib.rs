//! Shared test utilities for imgtest
//!
//! This crate provides an in-memory infrastructure API and fixtures for the
//! coordinator's integration tests.
//!
//! ## Modules
//!
//! - [`fake`]: Scriptable [`FakeInfra`] and its [`FakeConnector`]
//! - [`fixtures`]: Ready-made image and environment specs

pub mod fake;
pub mod fixtures;

// Re-export commonly used items
pub use fake::{FakeConnector, FakeInfra, Op};
pub use fixtures::{environment_spec, image_spec};
