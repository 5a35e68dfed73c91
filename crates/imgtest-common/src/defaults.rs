//! Default configuration values for a test environment run
//!
//! Stage timeouts are lower bounds: per-image and per-environment overrides
//! can only raise them.

/// Default timeout for long infrastructure operations (image upload,
/// instance creation, waiting for ACTIVE), in seconds
pub const LONG_STAGE_TIMEOUT_SECS: u64 = 360;

/// Default timeout for short infrastructure operations (keypair creation,
/// per-resource cleanup), in seconds
pub const SHORT_STAGE_TIMEOUT_SECS: u64 = 10;

/// Default image upload timeout in seconds
pub const DEFAULT_UPLOAD_TIMEOUT: u64 = LONG_STAGE_TIMEOUT_SECS;

/// Default keypair creation timeout in seconds
pub const DEFAULT_KEYPAIR_TIMEOUT: u64 = SHORT_STAGE_TIMEOUT_SECS;

/// Default per-resource cleanup timeout in seconds
pub const DEFAULT_CLEANUP_TIMEOUT: u64 = SHORT_STAGE_TIMEOUT_SECS;

/// Default timeout for an instance to become ACTIVE, in seconds
pub const DEFAULT_ACTIVE_TIMEOUT: u64 = LONG_STAGE_TIMEOUT_SECS;

/// Default instance creation timeout in seconds
pub const DEFAULT_CREATE_TIMEOUT: u64 = LONG_STAGE_TIMEOUT_SECS;

/// Interval between instance status polls, in seconds
pub const STATUS_POLL_INTERVAL_SECS: u64 = 3;

/// Interval between TCP connection attempts, in seconds
pub const PORT_PROBE_INTERVAL_SECS: u64 = 3;

/// Delay after the first successful connect before reporting the port open.
/// Accepting connections often precedes the service being usable.
pub const PORT_PROBE_SETTLE_SECS: u64 = 1;

/// Default port for reachability checks (SSH)
pub const DEFAULT_PROBE_PORT: u16 = 22;

/// Default reachability probe timeout in seconds
pub const DEFAULT_PROBE_TIMEOUT: u64 = 60;
