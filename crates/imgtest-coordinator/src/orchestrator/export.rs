//! Flat key/value description of a provisioned environment
//!
//! The export is what the test step receives (typically as environment
//! variables). Numbered keys are 1-based and follow the API's ordering.

use std::collections::BTreeMap;

use tracing::debug;

use super::types::ProvisionState;
use crate::config::EnvironmentSpec;
use crate::error::EnvError;
use crate::infra::InfraOperations;

/// Flat `String -> String` description of the environment
pub type EnvironmentExport = BTreeMap<String, String>;

/// Build the export for a fully provisioned environment.
///
/// # Errors
/// * `EnvError::Precondition` - provisioning has not completed
/// * `EnvError::Export` - flavor or interface lookup failed
pub async fn export_environment<O: InfraOperations>(
    ops: &O,
    environment: &EnvironmentSpec,
    state: &ProvisionState,
) -> Result<EnvironmentExport, EnvError> {
    let not_ready = || EnvError::Precondition("instance is not active yet".into());
    if !state.is_ready() {
        return Err(not_ready());
    }
    let (Some(instance), Some(main_ip), Some(key_file)) = (
        state.handles.instance.get(),
        state.main_ip.as_deref(),
        state.private_key.as_ref(),
    ) else {
        return Err(not_ready());
    };

    let flavor = ops
        .get_flavor(&environment.flavor)
        .await
        .map_err(EnvError::Export)?;
    let interfaces = ops
        .interface_list(&instance.id)
        .await
        .map_err(EnvError::Export)?;

    let mut env = EnvironmentExport::new();
    env.insert("instance_uuid".into(), instance.id.clone());
    env.insert("instance_name".into(), instance.name.to_lowercase());
    env.insert("flavor_id".into(), environment.flavor.clone());
    env.insert("main_ip".into(), main_ip.to_string());
    env.insert(
        "ssh_private_key".into(),
        key_file.path().display().to_string(),
    );
    env.insert("flavor_ram".into(), flavor.ram.to_string());
    env.insert("flavor_name".into(), flavor.name.clone());
    env.insert("flavor_vcpus".into(), flavor.vcpus.to_string());
    env.insert("flavor_disk".into(), flavor.disk.to_string());

    for (num, ip) in instance.ips().enumerate() {
        env.insert(format!("ip_{}", num + 1), ip.to_string());
    }
    for (num, iface) in interfaces.iter().enumerate() {
        env.insert(format!("iface_{}_info", num + 1), iface.to_string());
    }
    for (key, value) in &flavor.extra_specs {
        env.insert(format!("flavor_meta_{key}"), value.clone());
    }

    debug!(keys = env.len(), "Environment exported");
    Ok(env)
}
