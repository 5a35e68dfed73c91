//! Resource teardown
//!
//! Deletes the run's resources in [`CLEANUP_ORDER`] (instance, keypair,
//! image). Cleanup is total: every failure is logged and recorded in the
//! returned [`CleanupReport`], never propagated. It is also idempotent:
//! deleted resources are cleared from their handles, so running it again
//! only retries what is still there.

use std::future::Future;
use std::time::Duration;

use imgtest_common::{CLEANUP_ORDER, ResourceKind};
use tracing::{debug, info, instrument, warn};

use super::types::ProvisionState;
use crate::handles::ResourceHandle;
use crate::infra::{ImageRef, InfraOperations, InstanceRef, KeyPair, is_not_found};

/// Outcome of cleaning up one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupResult {
    /// Resource was successfully deleted
    Deleted,
    /// Resource was already deleted (not found)
    AlreadyDeleted,
    /// Deletion failed or timed out; the handle is kept for a later retry
    Failed,
    /// Resource exists but the run does not own it
    Kept,
    /// Nothing was tracked for this resource
    Absent,
}

impl CleanupResult {
    /// Whether the resource is gone after this step
    pub fn is_gone(self) -> bool {
        matches!(self, CleanupResult::Deleted | CleanupResult::AlreadyDeleted)
    }
}

/// Per-resource outcomes of one cleanup pass, in cleanup order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    entries: Vec<(ResourceKind, CleanupResult)>,
    /// The private key file was overwritten and removed during this pass
    pub private_key_wiped: bool,
}

impl CleanupReport {
    /// Outcome for `kind` (`Absent` if it was not visited)
    pub fn result(&self, kind: ResourceKind) -> CleanupResult {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, result)| *result)
            .unwrap_or(CleanupResult::Absent)
    }

    pub fn entries(&self) -> &[(ResourceKind, CleanupResult)] {
        &self.entries
    }

    /// Number of resources removed in this pass
    pub fn deleted_count(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_gone()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, r)| *r == CleanupResult::Failed)
    }
}

/// Deletes a run's resources through the infrastructure API
pub struct CleanupCoordinator<'a, O> {
    ops: &'a O,
    /// Upper bound for each delete call
    timeout: Duration,
}

impl<'a, O: InfraOperations> CleanupCoordinator<'a, O> {
    pub fn new(ops: &'a O, timeout: Duration) -> Self {
        Self { ops, timeout }
    }

    /// Tear down every owned resource in `state`.
    ///
    /// Never fails; see [`CleanupReport`] for what happened to each resource.
    #[instrument(skip_all)]
    pub async fn cleanup(&self, state: &mut ProvisionState) -> CleanupReport {
        info!("Clearing up...");
        let ops = self.ops;
        let mut report = CleanupReport::default();

        for kind in CLEANUP_ORDER {
            let result = match kind {
                ResourceKind::Instance => {
                    self.clean(
                        &mut state.handles.instance,
                        |i: &InstanceRef| i.id.clone(),
                        move |i: InstanceRef| async move { ops.delete_instance(&i).await },
                    )
                    .await
                }
                ResourceKind::Keypair => {
                    self.clean(
                        &mut state.handles.keypair,
                        |k: &KeyPair| k.name.clone(),
                        move |k: KeyPair| async move { ops.delete_keypair(&k).await },
                    )
                    .await
                }
                ResourceKind::Image => {
                    self.clean(
                        &mut state.handles.image,
                        |i: &ImageRef| i.id.clone(),
                        move |i: ImageRef| async move { ops.delete_image(&i).await },
                    )
                    .await
                }
            };
            report.entries.push((kind, result));

            if kind == ResourceKind::Keypair {
                report.private_key_wiped = wipe_private_key(state);
            }
        }

        info!(
            deleted = report.deleted_count(),
            failed = report.has_failures(),
            "Clearing done"
        );
        report
    }

    /// Delete one tracked resource if the run owns it
    async fn clean<T, F, Fut>(
        &self,
        handle: &mut ResourceHandle<T>,
        id_of: impl Fn(&T) -> String,
        delete: F,
    ) -> CleanupResult
    where
        T: Clone,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let label = handle.label();
        let Some(resource) = handle.get().cloned() else {
            return CleanupResult::Absent;
        };
        let id = id_of(&resource);

        if !handle.delete_on_cleanup() {
            info!(resource = label, id = %id, "Not removing {label}.");
            return CleanupResult::Kept;
        }

        info!(resource = label, id = %id, "Removing {label}.");
        match tokio::time::timeout(self.timeout, delete(resource)).await {
            Ok(Ok(())) => {
                handle.take();
                CleanupResult::Deleted
            }
            Ok(Err(e)) if is_not_found(&e) => {
                debug!(resource = label, id = %id, "Already deleted");
                handle.take();
                CleanupResult::AlreadyDeleted
            }
            Ok(Err(e)) => {
                warn!(resource = label, id = %id, error = ?e, "Error while clearing up {label}");
                CleanupResult::Failed
            }
            Err(_) => {
                warn!(
                    resource = label,
                    id = %id,
                    timeout_secs = self.timeout.as_secs(),
                    "Timed out while clearing up {label}"
                );
                CleanupResult::Failed
            }
        }
    }
}

/// Remove the private key file once neither the keypair nor the instance
/// is kept. Returns whether a file was wiped.
fn wipe_private_key(state: &mut ProvisionState) -> bool {
    let handles = &state.handles;
    if !(handles.keypair.delete_on_cleanup() && handles.instance.delete_on_cleanup()) {
        return false;
    }
    let Some(key) = state.private_key.take() else {
        return false;
    };
    let path = key.path().to_path_buf();
    match key.wipe() {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Error while clearing up ssh key file");
            false
        }
    }
}
