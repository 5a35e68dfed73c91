//! Scoped test environment
//!
//! [`TestEnvironment`] owns one run: it connects to the infrastructure API,
//! provisions through the [`StagePipeline`], hands the environment to the
//! caller and tears it down again. [`TestEnvironment::scoped`] guarantees
//! teardown on every path, including a panic in the caller's body.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument, warn};

use super::cleanup::CleanupCoordinator;
use super::export::{EnvironmentExport, export_environment};
use super::pipeline::StagePipeline;
use super::report::{TeardownReport, report_remaining};
use super::types::{ProvisionState, Stage};
use crate::config::{CleanupPolicy, EnvironmentSpec, ImageSource, ImageSpec, RunTimeouts};
use crate::error::EnvError;
use crate::infra::{InfraConnector, InfraOperations, InstanceRef};
use crate::probe;
use crate::wait::PollConfig;

/// One disposable test environment: image, keypair and instance
pub struct TestEnvironment<C: InfraConnector> {
    connector: C,
    client: OnceCell<C::Client>,
    image: ImageSpec,
    environment: EnvironmentSpec,
    policy: CleanupPolicy,
    timeouts: RunTimeouts,
    poll: PollConfig,
    state: ProvisionState,
    entered: bool,
    exited: bool,
}

/// Connect on first use; later calls reuse the client
async fn connect<'c, C: InfraConnector>(
    connector: &C,
    client: &'c OnceCell<C::Client>,
) -> Result<&'c C::Client, EnvError> {
    client
        .get_or_try_init(|| async {
            info!("Connecting to infrastructure API");
            connector.connect().await.map_err(EnvError::Connection)
        })
        .await
}

impl<C: InfraConnector> TestEnvironment<C> {
    /// Prepare a run; nothing is contacted until [`enter`](Self::enter).
    ///
    /// Stage deadlines are resolved from the image and environment overrides.
    pub fn new(connector: C, image: ImageSpec, environment: EnvironmentSpec) -> Self {
        let timeouts = RunTimeouts::resolve(&image.timeouts, &environment.timeouts);
        Self {
            connector,
            client: OnceCell::new(),
            image,
            environment,
            policy: CleanupPolicy::default(),
            timeouts,
            poll: PollConfig::default(),
            state: ProvisionState::default(),
            entered: false,
            exited: false,
        }
    }

    pub fn with_cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the instance status polling interval
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Provision the environment.
    ///
    /// On failure every created resource has already been cleaned up when
    /// the error is returned.
    #[instrument(skip_all, fields(image = %self.image.name))]
    pub async fn enter(&mut self) -> Result<(), EnvError> {
        if self.entered {
            return Err(EnvError::Precondition("environment already entered".into()));
        }
        self.entered = true;

        let ops = connect(&self.connector, &self.client).await?;

        if let ImageSource::Existing { id } = &self.image.source {
            let image = ops
                .get_image(id)
                .await
                .map_err(|e| EnvError::stage(Stage::UploadImage, e))?;
            info!(image_id = %image.id, "Found image {} ({})", image.id, image.name);
            self.state.handles.image.set_with_ownership(image, false);
            self.state.handles.override_image = true;
        }

        let pipeline = StagePipeline::new(
            ops,
            &self.image,
            &self.environment,
            self.policy,
            self.timeouts,
        )
        .with_poll_config(self.poll.clone());

        if let Err(e) = pipeline.run(&mut self.state).await {
            error!(error = %e, "Exception while preparing instance for test");
            // Timeouts were already cleaned up by the stage guard
            if !e.is_timeout() {
                CleanupCoordinator::new(ops, self.timeouts.cleanup_duration())
                    .cleanup(&mut self.state)
                    .await;
            }
            return Err(e);
        }

        info!(
            main_ip = self.state.main_ip.as_deref().unwrap_or_default(),
            "Test environment ready"
        );
        Ok(())
    }

    /// Tear the environment down and report what is left.
    ///
    /// Safe to call on every path: after a failed `enter`, twice, or without
    /// having connected at all.
    #[instrument(skip_all)]
    pub async fn exit(&mut self) -> TeardownReport {
        self.exited = true;
        let cleanup = match self.client.get() {
            Some(ops) => {
                CleanupCoordinator::new(ops, self.timeouts.cleanup_duration())
                    .cleanup(&mut self.state)
                    .await
            }
            None => Default::default(),
        };
        let remaining = report_remaining(&self.state);
        TeardownReport { cleanup, remaining }
    }

    /// Run `body` against a provisioned environment, with teardown
    /// guaranteed afterwards.
    ///
    /// Provisioning errors are returned after cleanup without running
    /// `body`. A panic in `body` is re-raised once teardown has finished.
    ///
    /// # Example
    /// ```ignore
    /// let export = TestEnvironment::new(connector, image, environment)
    ///     .scoped(|env| async move { Ok::<_, EnvError>(env.export().await?) }.boxed_local())
    ///     .await?;
    /// ```
    pub async fn scoped<T, E, F>(mut self, body: F) -> Result<T, E>
    where
        E: From<EnvError>,
        F: for<'e> FnOnce(&'e TestEnvironment<C>) -> LocalBoxFuture<'e, Result<T, E>>,
    {
        let outcome = match self.enter().await {
            Ok(()) => AssertUnwindSafe(body(&self)).catch_unwind().await,
            Err(e) => Ok(Err(E::from(e))),
        };

        self.exit().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                error!("Test body panicked, environment was cleaned up");
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Flat description of the environment for the test step
    pub async fn export(&self) -> Result<EnvironmentExport, EnvError> {
        let Some(ops) = self.client.get() else {
            return Err(EnvError::Precondition("not connected".into()));
        };
        export_environment(ops, &self.environment, &self.state).await
    }

    /// Wait until the instance accepts TCP connections on `port`
    pub async fn wait_for_port(&self, port: u16, timeout: Duration) -> bool {
        let Some(address) = self.state.main_ip.as_deref() else {
            warn!(port, "No instance address to probe");
            return false;
        };
        info!(
            "Waiting for instance to accept connections on {}:{} (time limit is {} s)",
            address,
            port,
            timeout.as_secs()
        );
        let open = probe::wait_for_port(address, port, timeout).await;
        if open {
            info!("Instance accepts connections on port {port}");
        } else {
            warn!("Instance is not accepting connection on ip {address} port {port}.");
        }
        open
    }

    /// Current provisioning state
    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    pub fn instance(&self) -> Option<&InstanceRef> {
        self.state.handles.instance.get()
    }

    pub fn main_ip(&self) -> Option<&str> {
        self.state.main_ip.as_deref()
    }

    pub fn private_key_path(&self) -> Option<&Path> {
        self.state.private_key.as_ref().map(|key| key.path())
    }

    pub fn timeouts(&self) -> &RunTimeouts {
        &self.timeouts
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.policy
    }
}

impl<C: InfraConnector> Drop for TestEnvironment<C> {
    fn drop(&mut self) {
        if self.entered && !self.exited && !self.state.handles.is_empty() {
            for (kind, id) in self.state.handles.remaining() {
                warn!(
                    resource = %kind,
                    id = %id,
                    "Test environment dropped without exit, resource may be leaked"
                );
            }
        }
    }
}
