//! Provisioning stages
//!
//! Runs keypair → image → instance → wait-active → discover address, each
//! under its own deadline. Every stage records what it created in the
//! [`ProvisionState`] before the next one starts, so a failure at any point
//! leaves the handle set describing exactly what exists.

use std::cell::RefCell;
use std::future::Future;
use std::time::Duration;

use imgtest_common::make_test_name;
use imgtest_common::naming::{INSTANCE_BARE_NAME, KEYPAIR_BARE_NAME};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::cleanup::CleanupCoordinator;
use super::types::{ProvisionState, Stage};
use crate::config::{CleanupPolicy, EnvironmentSpec, ImageSource, ImageSpec, RunTimeouts};
use crate::error::EnvError;
use crate::infra::{BootRequest, InfraOperations, InstanceRef, InstanceStatus};
use crate::keyfile::PrivateKeyFile;
use crate::timeout::run_with_timeout;
use crate::wait::{PollConfig, poll_until};

/// Drives the provisioning stages against one infrastructure client
pub struct StagePipeline<'a, O> {
    ops: &'a O,
    image: &'a ImageSpec,
    environment: &'a EnvironmentSpec,
    policy: CleanupPolicy,
    timeouts: RunTimeouts,
    poll: PollConfig,
}

impl<'a, O: InfraOperations> StagePipeline<'a, O> {
    pub fn new(
        ops: &'a O,
        image: &'a ImageSpec,
        environment: &'a EnvironmentSpec,
        policy: CleanupPolicy,
        timeouts: RunTimeouts,
    ) -> Self {
        Self {
            ops,
            image,
            environment,
            policy,
            timeouts,
            poll: PollConfig::default(),
        }
    }

    /// Override the status polling interval
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Run every stage in order.
    ///
    /// A stage that exceeds its deadline triggers cleanup before its
    /// [`EnvError::Timeout`] is returned. Other errors are returned as-is and
    /// leave cleanup to the caller.
    #[instrument(skip_all)]
    pub async fn run(&self, state: &mut ProvisionState) -> Result<(), EnvError> {
        self.create_keypair(state).await?;
        self.upload_image(state).await?;
        self.spawn_instance(state).await?;
        self.wait_for_active(state).await?;
        self.discover_address(state).await?;
        Ok(())
    }

    /// Run `work` under `seconds`, cleaning up `state` if the deadline expires
    async fn guarded<T, W, Fut>(
        &self,
        state: &mut ProvisionState,
        stage: Stage,
        seconds: u64,
        work: W,
    ) -> Result<T, EnvError>
    where
        W: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, EnvError>>,
    {
        let cleanup = CleanupCoordinator::new(self.ops, self.timeouts.cleanup_duration());
        run_with_timeout(stage, Duration::from_secs(seconds), work, move || async move {
            info!("Clearing up due to error");
            cleanup.cleanup(state).await;
        })
        .await
    }

    async fn create_keypair(&self, state: &mut ProvisionState) -> Result<(), EnvError> {
        let stage = Stage::CreateKeypair;
        let ops = self.ops;
        let name = make_test_name(KEYPAIR_BARE_NAME);

        let keypair = self
            .guarded(state, stage, self.timeouts.keypair, |cancel| async move {
                ops.create_keypair(&name, &cancel)
                    .await
                    .map_err(|e| EnvError::stage(stage, e))
            })
            .await?;
        info!(keypair = %keypair.name, "Keypair created");

        let key_file = PrivateKeyFile::create(&keypair.private_key);
        state
            .handles
            .keypair
            .set_with_ownership(keypair, self.policy.delete_keypair);
        state.private_key = Some(key_file.map_err(EnvError::PrivateKey)?);
        state.mark_completed(stage);
        Ok(())
    }

    async fn upload_image(&self, state: &mut ProvisionState) -> Result<(), EnvError> {
        let stage = Stage::UploadImage;
        let (filename, properties) = match &self.image.source {
            ImageSource::Upload {
                filename,
                properties,
            } => (filename, properties),
            ImageSource::Existing { id } => {
                info!(image_id = %id, "Using existing image, skipping upload");
                state.mark_completed(stage);
                return Ok(());
            }
        };

        let ops = self.ops;
        let seconds = self.timeouts.upload;
        let name = make_test_name(&self.image.name);
        info!(
            "Uploading image from {} (time limit is {} s)",
            filename.display(),
            seconds
        );

        let image = self
            .guarded(state, stage, seconds, |cancel| async move {
                ops.upload_image(&name, filename, properties, &cancel)
                    .await
                    .map_err(|e| EnvError::stage(stage, e))
            })
            .await?;
        info!(image_id = %image.id, "Image {} uploaded.", image.name);

        state
            .handles
            .image
            .set_with_ownership(image, self.policy.delete_image);
        state.mark_completed(stage);
        Ok(())
    }

    async fn spawn_instance(&self, state: &mut ProvisionState) -> Result<(), EnvError> {
        let stage = Stage::SpawnInstance;
        let (Some(keypair), Some(image)) = (state.handles.keypair.get(), state.handles.image.get())
        else {
            return Err(EnvError::Precondition(
                "instance needs both a keypair and an image".into(),
            ));
        };

        let request = BootRequest {
            name: make_test_name(INSTANCE_BARE_NAME),
            image_id: image.id.clone(),
            flavor_id: self.environment.flavor.clone(),
            key_name: keypair.name.clone(),
            nics: self.environment.nics.clone(),
            config_drive: self.environment.config_drive,
            availability_zone: self.environment.availability_zone.clone(),
        };

        let ops = self.ops;
        let seconds = self.timeouts.create;
        info!("Creating test instance (time limit is {} s)", seconds);

        let instance = self
            .guarded(state, stage, seconds, |cancel| async move {
                ops.boot_instance(&request, &cancel)
                    .await
                    .map_err(|e| EnvError::stage(stage, e))
            })
            .await?;
        info!(instance_id = %instance.id, "Instance {} created.", instance.id);

        state
            .handles
            .instance
            .set_with_ownership(instance, self.policy.delete_instance);
        state.mark_completed(stage);
        Ok(())
    }

    async fn wait_for_active(&self, state: &mut ProvisionState) -> Result<(), EnvError> {
        let stage = Stage::WaitActive;
        let Some(instance_id) = state.handles.instance.get().map(|i| i.id.clone()) else {
            return Err(EnvError::Precondition("no instance to wait for".into()));
        };

        let ops = self.ops;
        let poll = &self.poll;
        let seconds = self.timeouts.active;
        let latest: RefCell<Option<InstanceRef>> = RefCell::new(None);
        info!(
            "Waiting for instance to become active (time limit is {} s)",
            seconds
        );

        let result = self
            .guarded(state, stage, seconds, |cancel| {
                let latest = &latest;
                let instance_id = instance_id.as_str();
                async move {
                    let check = || async {
                        let instance = match ops.get_instance(instance_id, &cancel).await {
                            Ok(instance) => instance,
                            Err(e) => return Err(EnvError::stage(stage, e)),
                        };
                        let status = instance.status.clone();
                        latest.replace(Some(instance));
                        match status {
                            InstanceStatus::Active => Ok(Some(())),
                            s if s.is_terminal_failure() => Err(EnvError::Instance {
                                id: instance_id.to_string(),
                                status: s.to_string(),
                            }),
                            _ => Ok(None),
                        }
                    };
                    poll_until(poll, &cancel, check, "instance")
                        .await?
                        .ok_or(EnvError::Timeout { stage, seconds })
                }
            })
            .await;

        // Refresh the handle with the last status seen, unless cleanup already
        // removed the instance
        if let Some(instance) = latest.into_inner() {
            if state.handles.instance.is_present() {
                state.handles.instance.set(instance);
            }
        }

        match result {
            Ok(()) => {
                info!(instance_id = %instance_id, "Instance became active.");
                state.mark_completed(stage);
                Ok(())
            }
            Err(e) => {
                if let EnvError::Instance { status, .. } = &e {
                    warn!(instance_id = %instance_id, status = %status, "Instance failed to build");
                }
                Err(e)
            }
        }
    }

    async fn discover_address(&self, state: &mut ProvisionState) -> Result<(), EnvError> {
        let stage = Stage::DiscoverAddress;
        let Some(instance) = state.handles.instance.get().cloned() else {
            return Err(EnvError::Precondition("no instance to resolve".into()));
        };

        let ops = self.ops;
        let pattern = self.environment.main_nic_regexp.clone();
        let address = self
            .guarded(state, stage, self.timeouts.active, |_cancel| async move {
                ops.get_instance_ip(&instance, pattern)
                    .await
                    .map_err(|e| EnvError::stage(stage, e))
            })
            .await?;
        info!(main_ip = %address, "Instance address discovered");

        state.main_ip = Some(address);
        state.mark_completed(stage);
        Ok(())
    }
}
