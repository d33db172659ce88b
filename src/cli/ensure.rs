use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chart::{ChartInstaller, HelmCli};
use crate::cluster::{ClusterClient, KubeCluster};
use crate::error::RegistryError;
use crate::registry::{ProvisionOutcome, RegistryConfig, RegistryProvisioner};
use crate::settings::Settings;

/// Deploy the configured internal registry if needed and wait for it
pub async fn ensure_registry(settings: &Settings, cancel: CancellationToken) -> Result<()> {
    let cluster = Arc::new(
        KubeCluster::connect()
            .await
            .context("Failed to connect to Kubernetes cluster")?,
    );
    let installer = Arc::new(HelmCli::new(settings.provisioning.helm_binary.clone()));

    let registry = run_ensure(settings, cluster, installer, cancel).await?;

    println!(
        "✓ Internal registry is ready at {}{}",
        registry.url.as_deref().unwrap_or("<unknown>"),
        if registry.insecure == Some(true) {
            " (insecure)"
        } else {
            ""
        }
    );
    Ok(())
}

/// Provision against `cluster` and persist a newly resolved endpoint
async fn run_ensure(
    settings: &Settings,
    cluster: Arc<dyn ClusterClient>,
    installer: Arc<dyn ChartInstaller>,
    cancel: CancellationToken,
) -> Result<RegistryConfig> {
    let internal = settings
        .internal_registry
        .as_ref()
        .context("No internal_registry configured")?;
    let mut registry = settings
        .registries
        .get(&internal.registry)
        .cloned()
        .ok_or_else(|| RegistryError::RegistryNotFound(internal.registry.clone()))?;

    let provisioner = RegistryProvisioner::new(
        cluster,
        installer,
        settings.provisioning.provision_options(),
        cancel,
    );

    let outcome = match provisioner.ensure_registry(&internal.release, &mut registry).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_timeout() {
                warn!("Registry is not ready yet; re-run `rise-registry ensure` to keep waiting");
            }
            return Err(e.into());
        }
    };

    if outcome != ProvisionOutcome::AlreadyPresent {
        settings.persist_endpoint(&internal.registry, &registry)?;
    } else {
        info!(registry = %internal.registry, "Registry already deployed, configuration unchanged");
    }

    Ok(registry)
}
