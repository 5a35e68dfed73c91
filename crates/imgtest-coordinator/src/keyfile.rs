//! On-disk copy of the run's SSH private key
//!
//! The key is written once after keypair creation so the test step can reach
//! the instance. It is wiped when the keypair and instance are gone, and kept
//! otherwise so an operator can still log into a kept instance.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of bytes overwritten before the file is removed
const WIPE_LEN: usize = 4096;

/// Private key persisted to a temporary file
#[derive(Debug)]
pub struct PrivateKeyFile {
    path: PathBuf,
}

impl PrivateKeyFile {
    /// Write `private_key` to a new temporary file (mode 0600 on unix)
    pub fn create(private_key: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("imgtest_ssh_key")
            .suffix("private")
            .tempfile()?;
        file.write_all(private_key.as_bytes())?;
        file.flush()?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        debug!(path = %path.display(), "Saved private key");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the key material, then remove the file
    pub fn wipe(self) -> io::Result<()> {
        fs::write(&self.path, [b' '; WIPE_LEN])?;
        fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "Wiped private key");
        Ok(())
    }
}
