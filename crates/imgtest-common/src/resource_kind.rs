//! Provisioned resource kinds and cleanup ordering
//!
//! Every run provisions at most one resource of each kind. Resources must be
//! removed in dependency order: the instance references both the keypair and
//! the image, so it goes first.

use std::fmt;

/// Types of cloud resources provisioned for a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Compute instance (depends on keypair and image)
    Instance,
    /// SSH keypair
    Keypair,
    /// Disk image (most expensive to recreate, least urgent to remove)
    Image,
}

/// Fixed teardown order used by every cleanup pass.
pub const CLEANUP_ORDER: [ResourceKind; 3] = [
    ResourceKind::Instance,
    ResourceKind::Keypair,
    ResourceKind::Image,
];

impl ResourceKind {
    /// Get cleanup priority (lower number = cleanup first)
    ///
    /// - 0: Delete the instance (holds references to keypair and image)
    /// - 1: Delete the keypair
    /// - 2: Delete the image
    pub fn cleanup_priority(self) -> u8 {
        match self {
            ResourceKind::Instance => 0,
            ResourceKind::Keypair => 1,
            ResourceKind::Image => 2,
        }
    }

    /// Human-readable label used in logs and reports
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Keypair => "ssh key",
            ResourceKind::Image => "image",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
