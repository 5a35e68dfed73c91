//! Names for per-run test resources
//!
//! Every resource created by a run carries the `IMGTEST-` prefix so leftovers
//! are easy to find in the cloud console, plus a random v4 UUID so that
//! concurrent runs never collide.

/// Prefix shared by all resources created by imgtest
pub const NAME_PREFIX: &str = "IMGTEST";

/// Bare name used for the run's keypair
pub const KEYPAIR_BARE_NAME: &str = "key";

/// Bare name used for the run's instance
pub const INSTANCE_BARE_NAME: &str = "test";

/// Build a unique resource name: `IMGTEST-{bare_name}-{uuid4}`.
///
/// # Example
///
/// ```
/// use imgtest_common::naming::make_test_name;
///
/// let name = make_test_name("key");
/// assert!(name.starts_with("IMGTEST-key-"));
/// ```
pub fn make_test_name(bare_name: &str) -> String {
    format!("{}-{}-{}", NAME_PREFIX, bare_name, uuid::Uuid::new_v4())
}
