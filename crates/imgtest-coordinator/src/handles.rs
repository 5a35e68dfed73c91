//! Ownership-tagged handles for the resources a run provisions
//!
//! A handle starts empty, is filled by the stage that creates its resource,
//! and is cleared again once cleanup has deleted it. The ownership flag
//! decides whether cleanup may delete the resource at all.

use crate::infra::{ImageRef, InstanceRef, KeyPair};
use imgtest_common::ResourceKind;

/// Tracks one provisioned resource and whether the run should delete it
///
/// # Example
///
/// ```
/// use imgtest_coordinator::handles::ResourceHandle;
/// use imgtest_common::ResourceKind;
///
/// let mut handle = ResourceHandle::new(ResourceKind::Instance, true);
/// assert!(!handle.is_present());
///
/// handle.set("i-123".to_string());
/// assert_eq!(handle.get().map(String::as_str), Some("i-123"));
///
/// // After deletion the reference is cleared so cleanup stays idempotent
/// assert_eq!(handle.take().as_deref(), Some("i-123"));
/// assert!(!handle.is_present());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle<T> {
    kind: ResourceKind,
    resource: Option<T>,
    delete_on_cleanup: bool,
}

impl<T> ResourceHandle<T> {
    /// Create an empty handle
    pub fn new(kind: ResourceKind, delete_on_cleanup: bool) -> Self {
        Self {
            kind,
            resource: None,
            delete_on_cleanup,
        }
    }

    /// Record the created (or referenced) resource
    pub fn set(&mut self, resource: T) {
        self.resource = Some(resource);
    }

    /// Record a resource with an explicit ownership decision
    pub fn set_with_ownership(&mut self, resource: T, delete_on_cleanup: bool) {
        self.resource = Some(resource);
        self.delete_on_cleanup = delete_on_cleanup;
    }

    /// Get the tracked resource without consuming
    pub fn get(&self) -> Option<&T> {
        self.resource.as_ref()
    }

    /// Detach the tracked resource, leaving the handle empty
    pub fn take(&mut self) -> Option<T> {
        self.resource.take()
    }

    pub fn is_present(&self) -> bool {
        self.resource.is_some()
    }

    /// Whether cleanup is allowed to delete this resource
    pub fn delete_on_cleanup(&self) -> bool {
        self.delete_on_cleanup
    }

    /// A resource exists and the run has chosen to leave it behind
    pub fn is_kept(&self) -> bool {
        self.is_present() && !self.delete_on_cleanup
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Human-readable label for logs
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// The three resources of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleSet {
    pub instance: ResourceHandle<InstanceRef>,
    pub keypair: ResourceHandle<KeyPair>,
    pub image: ResourceHandle<ImageRef>,
    /// The image was supplied by the caller rather than uploaded
    pub override_image: bool,
}

impl Default for HandleSet {
    fn default() -> Self {
        Self {
            instance: ResourceHandle::new(ResourceKind::Instance, true),
            keypair: ResourceHandle::new(ResourceKind::Keypair, true),
            image: ResourceHandle::new(ResourceKind::Image, true),
            override_image: false,
        }
    }
}

impl HandleSet {
    /// Number of resources currently tracked
    pub fn len(&self) -> usize {
        [
            self.instance.is_present(),
            self.keypair.is_present(),
            self.image.is_present(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    /// Check if there are no tracked resources
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kinds of the resources still tracked, in cleanup order
    pub fn remaining(&self) -> Vec<(ResourceKind, String)> {
        let mut out = Vec::new();
        if let Some(instance) = self.instance.get() {
            out.push((ResourceKind::Instance, instance.id.clone()));
        }
        if let Some(keypair) = self.keypair.get() {
            out.push((ResourceKind::Keypair, keypair.name.clone()));
        }
        if let Some(image) = self.image.get() {
            out.push((ResourceKind::Image, image.id.clone()));
        }
        out
    }
}
