//! Configuration types for a test environment run
//!
//! These are the already-resolved values handed over by the configuration
//! layer. They are immutable inputs; everything a run produces lives in
//! [`crate::orchestrator::ProvisionState`].

use crate::infra::NicRequest;
use imgtest_common::defaults::{
    DEFAULT_ACTIVE_TIMEOUT, DEFAULT_CLEANUP_TIMEOUT, DEFAULT_CREATE_TIMEOUT,
    DEFAULT_KEYPAIR_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Per-stage timeout overrides, in seconds
///
/// Present on both the image and the environment configuration; see
/// [`RunTimeouts::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StageTimeoutOverrides {
    pub upload_timeout: Option<u64>,
    pub keypair_timeout: Option<u64>,
    pub cleanup_timeout: Option<u64>,
    pub active_timeout: Option<u64>,
    pub create_timeout: Option<u64>,
}

/// Where the run's image comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// Upload a fresh image from a local file
    Upload {
        filename: PathBuf,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    /// Reuse an image that already exists; never deleted by the run
    Existing { id: String },
}

/// Disk image under test
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageSpec {
    /// Bare image name; uploads are named `IMGTEST-{name}-{uuid}`
    pub name: String,
    pub source: ImageSource,
    #[serde(default)]
    pub timeouts: StageTimeoutOverrides,
}

impl ImageSpec {
    /// Image to be uploaded from `filename`
    pub fn upload(name: impl Into<String>, filename: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ImageSource::Upload {
                filename: filename.into(),
                properties: BTreeMap::new(),
            },
            timeouts: StageTimeoutOverrides::default(),
        }
    }

    /// Replace the source with an existing image (the override image)
    pub fn with_override(mut self, image_id: impl Into<String>) -> Self {
        self.source = ImageSource::Existing { id: image_id.into() };
        self
    }

    /// Add an image metadata property (ignored for existing images)
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let ImageSource::Upload { properties, .. } = &mut self.source {
            properties.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeoutOverrides) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Whether the run references a pre-existing image
    pub fn is_override(&self) -> bool {
        matches!(self.source, ImageSource::Existing { .. })
    }
}

/// Test environment (tenant, flavor, networking) the instance boots into
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentSpec {
    /// Flavor id used for the instance
    pub flavor: String,
    #[serde(default)]
    pub nics: Vec<NicRequest>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub config_drive: bool,
    /// Pattern selecting which network provides the main address
    #[serde(default)]
    pub main_nic_regexp: Option<String>,
    #[serde(default)]
    pub timeouts: StageTimeoutOverrides,
}

impl EnvironmentSpec {
    pub fn new(flavor: impl Into<String>) -> Self {
        Self {
            flavor: flavor.into(),
            nics: Vec::new(),
            availability_zone: None,
            config_drive: false,
            main_nic_regexp: None,
            timeouts: StageTimeoutOverrides::default(),
        }
    }

    pub fn with_network(mut self, net_id: impl Into<String>) -> Self {
        self.nics.push(NicRequest {
            net_id: Some(net_id.into()),
        });
        self
    }

    pub fn with_availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    pub fn with_config_drive(mut self, config_drive: bool) -> Self {
        self.config_drive = config_drive;
        self
    }

    pub fn with_main_nic_regexp(mut self, pattern: impl Into<String>) -> Self {
        self.main_nic_regexp = Some(pattern.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeoutOverrides) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Which resources the run deletes at teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    pub delete_image: bool,
    pub delete_keypair: bool,
    pub delete_instance: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            delete_image: true,
            delete_keypair: true,
            delete_instance: true,
        }
    }
}

impl CleanupPolicy {
    /// Keep the uploaded image after the run
    pub fn keep_image(mut self) -> Self {
        self.delete_image = false;
        self
    }

    /// Keep the instance (and its private key file) for debugging
    pub fn keep_instance(mut self) -> Self {
        self.delete_instance = false;
        self
    }
}

/// Effective per-stage deadlines for a run, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTimeouts {
    pub upload: u64,
    pub keypair: u64,
    pub cleanup: u64,
    pub active: u64,
    pub create: u64,
}

impl Default for RunTimeouts {
    fn default() -> Self {
        Self {
            upload: DEFAULT_UPLOAD_TIMEOUT,
            keypair: DEFAULT_KEYPAIR_TIMEOUT,
            cleanup: DEFAULT_CLEANUP_TIMEOUT,
            active: DEFAULT_ACTIVE_TIMEOUT,
            create: DEFAULT_CREATE_TIMEOUT,
        }
    }
}

/// Largest of the image override, the environment override and the default.
fn max_of(image: Option<u64>, environment: Option<u64>, default: u64) -> u64 {
    [image, environment]
        .into_iter()
        .flatten()
        .fold(default, u64::max)
}

impl RunTimeouts {
    /// Resolve each deadline as the maximum of the per-image override, the
    /// per-environment override and the default. Overrides never shorten a
    /// stage below its default.
    pub fn resolve(image: &StageTimeoutOverrides, environment: &StageTimeoutOverrides) -> Self {
        let defaults = Self::default();
        Self {
            upload: max_of(image.upload_timeout, environment.upload_timeout, defaults.upload),
            keypair: max_of(
                image.keypair_timeout,
                environment.keypair_timeout,
                defaults.keypair,
            ),
            cleanup: max_of(
                image.cleanup_timeout,
                environment.cleanup_timeout,
                defaults.cleanup,
            ),
            active: max_of(image.active_timeout, environment.active_timeout, defaults.active),
            create: max_of(image.create_timeout, environment.create_timeout, defaults.create),
        }
    }

    pub fn cleanup_duration(&self) -> Duration {
        Duration::from_secs(self.cleanup)
    }
}
