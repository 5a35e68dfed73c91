//! Ready-made run inputs

use imgtest_coordinator::config::{EnvironmentSpec, ImageSpec};

/// Image to be uploaded from a (fake) local file
///
/// # Example
///
/// ```
/// use imgtest_test_utils::fixtures::image_spec;
///
/// let image = image_spec();
/// assert!(!image.is_override());
/// ```
pub fn image_spec() -> ImageSpec {
    ImageSpec::upload("cirros", "/var/lib/images/cirros.qcow2").with_property("os_distro", "cirros")
}

/// Environment with one network and a small flavor
pub fn environment_spec() -> EnvironmentSpec {
    EnvironmentSpec::new("m1.small").with_network("net-a")
}
