use std::sync::Arc;
use tracing::{debug, info};

use super::models::InternalRegistryRelease;
use crate::cluster::{is_not_found, ClusterClient};
use crate::error::{RegistryError, Result};
use crate::wait::{Outcome, Poller};

/// Where clients should push to and pull from the internal registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub insecure: bool,
}

/// Resolves the usable registry address once its service is up
pub struct EndpointResolver {
    cluster: Arc<dyn ClusterClient>,
    poller: Poller,
}

impl EndpointResolver {
    pub fn new(cluster: Arc<dyn ClusterClient>, poller: Poller) -> Self {
        Self { cluster, poller }
    }

    /// Wait for the registry service's cluster address, then pick the endpoint
    ///
    /// A hostname from an enabled ingress in the chart values always wins over
    /// the cluster-internal `address:port`.
    pub async fn resolve(&self, release: &InternalRegistryRelease, port: u16) -> Result<Endpoint> {
        let address = self.wait_for_cluster_address(release).await?;
        let endpoint = select_endpoint(ingress_hostname(release.values.as_ref()), &address, port);

        info!(
            release = %release.name,
            url = %endpoint.url,
            insecure = endpoint.insecure,
            "Resolved registry endpoint"
        );
        Ok(endpoint)
    }

    async fn wait_for_cluster_address(&self, release: &InternalRegistryRelease) -> Result<String> {
        let cluster = self.cluster.as_ref();
        let namespace = release.namespace.as_str();
        let service = release.service_name();
        let service_name = service.as_str();

        let outcome = self
            .poller
            .poll(move || async move {
                match cluster.get_service(namespace, service_name).await {
                    Ok(svc) => {
                        let ip = svc.spec.and_then(|s| s.cluster_ip).unwrap_or_default();
                        if ip.is_empty() {
                            debug!(namespace, service = service_name, "Service has no cluster address yet");
                            Ok(None)
                        } else {
                            Ok(Some(ip))
                        }
                    }
                    Err(e) if is_not_found(&e) => {
                        debug!(namespace, service = service_name, "Service does not exist yet");
                        Ok(None)
                    }
                    Err(e) => Err(RegistryError::read(
                        format!("Unable to read registry service {}", service_name),
                        e,
                    )),
                }
            })
            .await?;

        match outcome {
            Outcome::Ready(ip) => Ok(ip),
            Outcome::TimedOut => Err(RegistryError::ServiceWaitTimeout { service }),
            Outcome::Cancelled => Err(RegistryError::Cancelled(format!(
                "waiting for registry service {}",
                service
            ))),
        }
    }
}

/// First ingress host from the chart values, if ingress is enabled
pub fn ingress_hostname(values: Option<&serde_yaml::Value>) -> Option<String> {
    let ingress = &values?["ingress"];
    if !ingress["enabled"].as_bool().unwrap_or(false) {
        return None;
    }
    ingress["hosts"][0]
        .as_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

pub fn select_endpoint(ingress_host: Option<String>, cluster_address: &str, port: u16) -> Endpoint {
    match ingress_host {
        Some(host) => Endpoint {
            url: host,
            insecure: false,
        },
        None => Endpoint {
            url: format!("{}:{}", cluster_address, port),
            insecure: true,
        },
    }
}
