use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::DeploymentStatus;
use crate::cluster::ClusterClient;
use crate::error::{RegistryError, Result};
use crate::wait::{Outcome, Poller};

/// Blocks until a deployment reports all desired replicas ready
pub struct ReadinessWaiter {
    cluster: Arc<dyn ClusterClient>,
    poller: Poller,
}

impl ReadinessWaiter {
    pub fn new(cluster: Arc<dyn ClusterClient>, poller: Poller) -> Self {
        Self { cluster, poller }
    }

    /// Poll `deployment` until ready replicas equal desired replicas
    ///
    /// A failed status read only skips that tick: it still sleeps and is
    /// charged against the budget, so the wait stays bounded even when the
    /// API keeps failing.
    pub async fn wait_until_ready(&self, namespace: &str, deployment: &str) -> Result<()> {
        let cluster = self.cluster.as_ref();

        info!(
            namespace,
            deployment,
            budget_secs = self.poller.budget().as_secs(),
            interval_secs = self.poller.interval().as_secs(),
            "Waiting for internal registry to start"
        );

        let outcome = self
            .poller
            .poll(move || async move {
                match cluster.get_deployment(namespace, deployment).await {
                    Ok(d) => {
                        let status = DeploymentStatus::from(&d);
                        debug!(
                            namespace,
                            deployment,
                            desired = status.desired_replicas,
                            ready = status.ready_replicas,
                            "Registry deployment status"
                        );
                        Ok::<_, RegistryError>(status.is_ready().then_some(()))
                    }
                    Err(e) => {
                        warn!(namespace, deployment, error = %e, "Unable to read registry deployment, retrying");
                        Ok(None)
                    }
                }
            })
            .await?;

        match outcome {
            Outcome::Ready(()) => {
                info!(namespace, deployment, "Internal registry is ready");
                Ok(())
            }
            Outcome::TimedOut => Err(RegistryError::ReadinessTimeout {
                deployment: deployment.to_string(),
            }),
            Outcome::Cancelled => Err(RegistryError::Cancelled(format!(
                "waiting for registry deployment {}",
                deployment
            ))),
        }
    }
}
