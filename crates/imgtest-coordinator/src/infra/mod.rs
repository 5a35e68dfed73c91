//! Infrastructure API boundary
//!
//! The coordinator never talks to a cloud directly. It drives an
//! [`InfraOperations`] implementation obtained from an [`InfraConnector`],
//! which keeps credentials, endpoints and wire formats out of this crate.
//!
//! Long-running calls receive a [`CancellationToken`] that is cancelled when
//! the enclosing stage times out. Implementations that hand work to threads
//! or child processes should stop that work once the token fires; the
//! coordinator also drops the in-flight future.

pub mod error;
pub mod types;

pub use error::{InfraError, classify_anyhow_error, is_not_found};
pub use types::{
    BootRequest, Flavor, ImageRef, InstanceRef, InstanceStatus, KeyPair, NetworkAddresses,
    NicRequest,
};

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Operations the coordinator needs from the infrastructure API.
///
/// Implementations report missing resources as [`InfraError::NotFound`]
/// so cleanup can treat them as already deleted.
///
/// Note: `get_instance_ip` takes `Option<String>` rather than
/// `Option<&str>` to work around mockall lifetime limitations.
#[allow(async_fn_in_trait)] // Single-task use, no Send bound needed on the futures
#[cfg_attr(test, mockall::automock)]
pub trait InfraOperations: Send + Sync {
    /// Create a keypair and return it with its private key
    async fn create_keypair(&self, name: &str, cancel: &CancellationToken) -> Result<KeyPair>;

    /// Upload a disk image from a local file
    async fn upload_image(
        &self,
        name: &str,
        file_path: &Path,
        properties: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<ImageRef>;

    /// Look up an existing image by id or name
    async fn get_image(&self, id_or_name: &str) -> Result<ImageRef>;

    /// Boot an instance
    async fn boot_instance(
        &self,
        request: &BootRequest,
        cancel: &CancellationToken,
    ) -> Result<InstanceRef>;

    /// Fetch the current state of an instance
    async fn get_instance(&self, id: &str, cancel: &CancellationToken) -> Result<InstanceRef>;

    /// Resolve the reachable address of an instance, optionally restricted to
    /// networks whose name matches `nic_pattern`
    async fn get_instance_ip(
        &self,
        instance: &InstanceRef,
        nic_pattern: Option<String>,
    ) -> Result<String>;

    /// Raw per-interface attachment records, in API order
    async fn interface_list(&self, instance_id: &str) -> Result<Vec<serde_json::Value>>;

    /// Fetch flavor details
    async fn get_flavor(&self, id: &str) -> Result<Flavor>;

    /// Delete an instance
    async fn delete_instance(&self, instance: &InstanceRef) -> Result<()>;

    /// Delete a keypair
    async fn delete_keypair(&self, keypair: &KeyPair) -> Result<()>;

    /// Delete an image
    async fn delete_image(&self, image: &ImageRef) -> Result<()>;
}

/// Produces an authenticated infrastructure client.
///
/// Called at most once per run; the client is reused for every stage and for
/// cleanup.
#[allow(async_fn_in_trait)]
pub trait InfraConnector {
    type Client: InfraOperations;

    /// Authenticate against the infrastructure API
    async fn connect(&self) -> Result<Self::Client>;
}
