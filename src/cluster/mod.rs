mod kubernetes;

#[cfg(test)]
pub mod fake;

pub use kubernetes::KubeCluster;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Secret, Service};

/// The cluster operations the registry workflow consumes
///
/// Every call is scoped by namespace and name and either returns the resource
/// or the API error, so callers can tell "not found" apart from other failures
/// with [`is_not_found`].
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Namespace, kube::Error>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, kube::Error>;

    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Deployment, kube::Error>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, kube::Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error>;

    async fn create_secret(&self, namespace: &str, secret: &Secret)
        -> Result<Secret, kube::Error>;

    /// Replace the secret named `name`, discarding its previous payload
    async fn replace_secret(
        &self,
        namespace: &str,
        name: &str,
        secret: &Secret,
    ) -> Result<Secret, kube::Error>;
}

/// Check if the API answered 404
pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(ae) if ae.code == 404)
}

/// Check if the API answered 409 (object already exists)
pub fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(ae) if ae.code == 409)
}
