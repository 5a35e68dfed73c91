//! Report of resources left behind after teardown

use std::fmt;
use std::path::PathBuf;

use imgtest_common::ResourceKind;
use tracing::warn;

use super::cleanup::CleanupReport;
use super::types::ProvisionState;

/// What happened at teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Outcome of the final cleanup pass
    pub cleanup: CleanupReport,
    /// Resources that still exist afterwards
    pub remaining: Vec<RemainingResource>,
}

impl TeardownReport {
    /// Nothing the run created is left behind
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// A resource that still exists once the run is over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemainingResource {
    /// Instance kept on request, for debugging
    KeptInstance { id: String, address: Option<String> },
    /// Uploaded image kept on request
    KeptImage { id: String },
    /// Keypair kept on request, with the private key file if still on disk
    KeptKeypair {
        name: String,
        private_key: Option<PathBuf>,
    },
    /// Owned resource whose deletion failed
    Leftover { kind: ResourceKind, id: String },
}

impl fmt::Display for RemainingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemainingResource::KeptInstance { id, address } => {
                write!(
                    f,
                    "Instance {id} is not removed. Please debug and remove it manually."
                )?;
                if let Some(address) = address {
                    write!(f, " Instance ip is {address}")?;
                }
                Ok(())
            }
            RemainingResource::KeptImage { id } => write!(
                f,
                "Image {id} is not removed. Please debug and remove it manually."
            ),
            RemainingResource::KeptKeypair { name, private_key } => {
                write!(f, "Keypair {name} is not removed.")?;
                if let Some(path) = private_key {
                    write!(f, " Private key file is {}", path.display())?;
                }
                Ok(())
            }
            RemainingResource::Leftover { kind, id } => {
                write!(f, "Failed to remove {kind} {id}. Please remove it manually.")
            }
        }
    }
}

/// List (and log) everything that survived cleanup.
///
/// Override images are never listed: the run did not create them.
pub fn report_remaining(state: &ProvisionState) -> Vec<RemainingResource> {
    let handles = &state.handles;
    let mut remaining = Vec::new();

    if let Some(instance) = handles.instance.get() {
        remaining.push(if handles.instance.is_kept() {
            RemainingResource::KeptInstance {
                id: instance.id.clone(),
                address: state.main_ip.clone(),
            }
        } else {
            RemainingResource::Leftover {
                kind: ResourceKind::Instance,
                id: instance.id.clone(),
            }
        });
    }

    if let Some(keypair) = handles.keypair.get() {
        remaining.push(if handles.keypair.is_kept() {
            RemainingResource::KeptKeypair {
                name: keypair.name.clone(),
                private_key: state
                    .private_key
                    .as_ref()
                    .map(|key| key.path().to_path_buf()),
            }
        } else {
            RemainingResource::Leftover {
                kind: ResourceKind::Keypair,
                id: keypair.name.clone(),
            }
        });
    }

    if let Some(image) = handles.image.get() {
        if handles.image.is_kept() {
            if !handles.override_image {
                remaining.push(RemainingResource::KeptImage {
                    id: image.id.clone(),
                });
            }
        } else {
            remaining.push(RemainingResource::Leftover {
                kind: ResourceKind::Image,
                id: image.id.clone(),
            });
        }
    }

    for resource in &remaining {
        warn!("{resource}");
    }
    remaining
}
