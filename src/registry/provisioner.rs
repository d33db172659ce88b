use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::endpoint::EndpointResolver;
use super::htpasswd::{merge_credentials, HTPASSWD_KEY};
use super::models::{DeploymentStatus, InternalRegistryRelease, RegistryAuth, RegistryConfig};
use super::namespace::ensure_namespace;
use super::readiness::ReadinessWaiter;
use crate::chart::ChartInstaller;
use crate::cluster::{is_not_found, ClusterClient};
use crate::error::{RegistryError, Result};
use crate::wait::Poller;

/// Knobs for installing the registry chart and waiting on it
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub chart: String,
    pub chart_version: String,
    pub registry_port: u16,
    pub service_wait: Duration,
    pub service_poll_interval: Duration,
    pub readiness_wait: Duration,
    pub readiness_poll_interval: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            chart: "stable/docker-registry".to_string(),
            chart_version: String::new(),
            registry_port: 5000,
            service_wait: Duration::from_secs(60),
            service_poll_interval: Duration::from_secs(3),
            readiness_wait: Duration::from_secs(120),
            readiness_poll_interval: Duration::from_secs(5),
        }
    }
}

/// What [`RegistryProvisioner::ensure_registry`] had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The chart was installed and the registry endpoint written to the config
    Installed,
    /// The deployment existed but an earlier run stopped before resolving
    /// its endpoint; credentials and endpoint were reconciled now
    Resumed,
    /// The deployment already existed; the config was left untouched
    AlreadyPresent,
}

/// Ensures the internal registry is deployed, credentialed and ready
///
/// Steps are idempotent and nothing is rolled back on failure; re-running
/// after an error picks up from whatever state the cluster is in.
pub struct RegistryProvisioner {
    cluster: Arc<dyn ClusterClient>,
    installer: Arc<dyn ChartInstaller>,
    options: ProvisionOptions,
    cancel: CancellationToken,
}

impl RegistryProvisioner {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        installer: Arc<dyn ChartInstaller>,
        options: ProvisionOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cluster,
            installer,
            options,
            cancel,
        }
    }

    /// Deploy the registry if it is missing, then wait until it is ready
    ///
    /// On install, `registry.url` and `registry.insecure` are set to the
    /// resolved endpoint. Only a 404 on the deployment probe triggers an
    /// install; any other probe failure is returned. A deployment that exists
    /// while `registry.url` is still unset gets its credentials and endpoint
    /// reconciled without reinstalling.
    pub async fn ensure_registry(
        &self,
        release: &InternalRegistryRelease,
        registry: &mut RegistryConfig,
    ) -> Result<ProvisionOutcome> {
        let namespace = release.namespace.as_str();
        let deployment_name = release.deployment_name();

        let existing = self.probe_deployment(namespace, &deployment_name).await?;

        let outcome = if existing.is_none() {
            info!(release = %release.name, namespace, "Internal registry not found, deploying");
            self.provision(release, registry).await?;
            ProvisionOutcome::Installed
        } else if registry.url.as_deref().unwrap_or_default().is_empty() {
            info!(
                release = %release.name,
                namespace,
                "Internal registry deployed without a resolved endpoint, resuming"
            );
            self.finish_provisioning(release, registry).await?;
            ProvisionOutcome::Resumed
        } else {
            debug!(release = %release.name, namespace, "Internal registry already deployed");
            ProvisionOutcome::AlreadyPresent
        };

        let ready = existing
            .as_ref()
            .map(|d| DeploymentStatus::from(d).is_ready())
            .unwrap_or(false);
        if !ready {
            self.readiness_waiter()
                .wait_until_ready(namespace, &deployment_name)
                .await?;
        }

        Ok(outcome)
    }

    async fn probe_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        match self.cluster.get_deployment(namespace, name).await {
            Ok(deployment) => Ok(Some(deployment)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(RegistryError::read(
                format!("Unable to check for registry deployment {}", name),
                e,
            )),
        }
    }

    async fn provision(
        &self,
        release: &InternalRegistryRelease,
        registry: &mut RegistryConfig,
    ) -> Result<()> {
        ensure_namespace(self.cluster.as_ref(), &release.namespace).await?;

        self.installer
            .install(
                &release.name,
                &release.namespace,
                &self.options.chart,
                &self.options.chart_version,
                release.values.as_ref(),
            )
            .await
            .map_err(RegistryError::Install)?;

        self.finish_provisioning(release, registry).await
    }

    /// Steps after the install; each is safe to repeat
    async fn finish_provisioning(
        &self,
        release: &InternalRegistryRelease,
        registry: &mut RegistryConfig,
    ) -> Result<()> {
        if let Some(auth) = &registry.auth {
            self.reconcile_htpasswd(release, auth).await?;
        } else {
            debug!(release = %release.name, "No registry auth configured, skipping htpasswd");
        }

        let endpoint = self
            .endpoint_resolver()
            .resolve(release, self.options.registry_port)
            .await?;
        registry.url = Some(endpoint.url);
        registry.insecure = Some(endpoint.insecure);

        Ok(())
    }

    /// Merge the configured user into the registry's htpasswd secret
    async fn reconcile_htpasswd(
        &self,
        release: &InternalRegistryRelease,
        auth: &RegistryAuth,
    ) -> Result<()> {
        let namespace = release.namespace.as_str();
        let name = release.htpasswd_secret_name();

        let (mut secret, exists) = match self.cluster.get_secret(namespace, &name).await {
            Ok(secret) => (secret, true),
            Err(e) if is_not_found(&e) => {
                debug!(namespace, secret = %name, "htpasswd secret does not exist yet");
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        ..Default::default()
                    },
                    type_: Some("Opaque".to_string()),
                    ..Default::default()
                };
                (secret, false)
            }
            Err(e) => {
                return Err(RegistryError::read(
                    "Unable to retrieve secret for docker registry",
                    e,
                ))
            }
        };

        let data = secret.data.get_or_insert_with(Default::default);
        let existing = data.get(HTPASSWD_KEY).map(|b| b.0.as_slice());
        let merged = merge_credentials(existing, &auth.username, &auth.password)?;
        data.insert(HTPASSWD_KEY.to_string(), k8s_openapi::ByteString(merged));

        let result = if exists {
            self.cluster.replace_secret(namespace, &name, &secret).await
        } else {
            self.cluster.create_secret(namespace, &secret).await
        };
        result.map_err(|e| RegistryError::write("Unable to update htpasswd secret", e))?;

        info!(namespace, secret = %name, username = %auth.username, "Registry credentials reconciled");
        Ok(())
    }

    fn endpoint_resolver(&self) -> EndpointResolver {
        let poller = Poller::new(
            self.options.service_wait,
            self.options.service_poll_interval,
            self.cancel.clone(),
        );
        EndpointResolver::new(self.cluster.clone(), poller)
    }

    fn readiness_waiter(&self) -> ReadinessWaiter {
        let poller = Poller::new(
            self.options.readiness_wait,
            self.options.readiness_poll_interval,
            self.cancel.clone(),
        );
        ReadinessWaiter::new(self.cluster.clone(), poller)
    }
}
