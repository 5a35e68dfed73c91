//! Infrastructure object references returned by the API collaborator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reference to a disk image known to the infrastructure API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub id: String,
    pub name: String,
}

/// SSH keypair created for a run
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub id: String,
    pub name: String,
    /// PEM-encoded private key, only available at creation time
    pub private_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Instance status as reported by the infrastructure API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Instance is ready for use
    Active,
    /// Instance is still being built
    Build,
    /// Instance failed to build (terminal)
    Error,
    /// Instance was deleted underneath us (terminal)
    Deleted,
    /// Any other transitional status
    Other(String),
}

impl InstanceStatus {
    /// Whether the instance can never become ACTIVE from this status
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, InstanceStatus::Error | InstanceStatus::Deleted)
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Active => "ACTIVE",
            InstanceStatus::Build => "BUILD",
            InstanceStatus::Error => "ERROR",
            InstanceStatus::Deleted => "DELETED",
            InstanceStatus::Other(s) => s,
        }
    }
}

impl FromStr for InstanceStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => InstanceStatus::Active,
            "BUILD" => InstanceStatus::Build,
            "ERROR" => InstanceStatus::Error,
            "DELETED" => InstanceStatus::Deleted,
            other => InstanceStatus::Other(other.to_string()),
        })
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addresses an instance holds on one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAddresses {
    /// Network name (e.g., "net-a")
    pub network: String,
    /// Addresses in the order reported by the API
    pub addresses: Vec<String>,
}

impl NetworkAddresses {
    pub fn new(network: impl Into<String>, addresses: Vec<String>) -> Self {
        Self {
            network: network.into(),
            addresses,
        }
    }
}

/// Reference to a compute instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub id: String,
    pub name: String,
    pub status: InstanceStatus,
    /// Per-network addresses, in API order
    pub networks: Vec<NetworkAddresses>,
}

impl InstanceRef {
    /// All addresses across all networks, in API order
    pub fn ips(&self) -> impl Iterator<Item = &str> {
        self.networks
            .iter()
            .flat_map(|n| n.addresses.iter().map(String::as_str))
    }
}

/// Compute flavor (instance size)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    /// Memory in MiB
    pub ram: u64,
    pub vcpus: u32,
    /// Root disk in GiB
    pub disk: u64,
    /// Provider-specific extra specs
    pub extra_specs: BTreeMap<String, String>,
}

/// Network attachment requested at boot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicRequest {
    #[serde(rename = "net-id", skip_serializing_if = "Option::is_none")]
    pub net_id: Option<String>,
}

/// Parameters for booting the test instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRequest {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub key_name: String,
    pub nics: Vec<NicRequest>,
    pub config_drive: bool,
    pub availability_zone: Option<String>,
}
