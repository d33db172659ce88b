use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};

/// Public registry address used when a registry URL is empty or the hub alias
pub const DOCKER_HUB_AUTH_URL: &str = "https://index.docker.io/v1/";

/// Alias users write for the public registry
pub const DOCKER_HUB_ALIAS: &str = "hub.docker.com";

/// Connection settings for one configured registry
///
/// `url` and `insecure` are filled in by provisioning when the registry is the
/// internal one, and persisted by the settings layer afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<RegistryAuth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

/// How the internal registry chart gets installed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalRegistryRelease {
    pub name: String,
    pub namespace: String,
    /// Chart values, passed through to the installer untouched
    #[serde(default)]
    pub values: Option<serde_yaml::Value>,
}

impl InternalRegistryRelease {
    /// Name of the deployment (and service) the chart creates
    pub fn deployment_name(&self) -> String {
        format!("{}-docker-registry", self.name)
    }

    pub fn service_name(&self) -> String {
        self.deployment_name()
    }

    /// Name of the secret holding the registry's htpasswd file
    pub fn htpasswd_secret_name(&self) -> String {
        format!("{}-docker-registry-secret", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub name: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Key into the configured registries
    pub registry: String,
}

fn default_tag() -> String {
    "latest".to_string()
}

/// Replica counts read from a deployment's status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub desired_replicas: i32,
    pub ready_replicas: i32,
}

impl DeploymentStatus {
    pub fn is_ready(&self) -> bool {
        self.desired_replicas > 0 && self.ready_replicas == self.desired_replicas
    }
}

impl From<&Deployment> for DeploymentStatus {
    fn from(deployment: &Deployment) -> Self {
        let status = deployment.status.as_ref();
        Self {
            desired_replicas: status.and_then(|s| s.replicas).unwrap_or(0),
            ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentStatus as K8sDeploymentStatus;

    #[test]
    fn test_release_resource_names() {
        let release = InternalRegistryRelease {
            name: "rise-registry".to_string(),
            namespace: "rise-system".to_string(),
            values: None,
        };
        assert_eq!(release.deployment_name(), "rise-registry-docker-registry");
        assert_eq!(release.service_name(), "rise-registry-docker-registry");
        assert_eq!(
            release.htpasswd_secret_name(),
            "rise-registry-docker-registry-secret"
        );
    }

    #[test]
    fn test_deployment_status_readiness() {
        let ready = DeploymentStatus {
            desired_replicas: 2,
            ready_replicas: 2,
        };
        let scaling = DeploymentStatus {
            desired_replicas: 2,
            ready_replicas: 1,
        };
        assert!(ready.is_ready());
        assert!(!scaling.is_ready());
        assert!(!DeploymentStatus::default().is_ready());
    }

    #[test]
    fn test_deployment_status_from_missing_status() {
        let deployment = Deployment::default();
        assert_eq!(DeploymentStatus::from(&deployment), DeploymentStatus::default());

        let deployment = Deployment {
            status: Some(K8sDeploymentStatus {
                replicas: Some(3),
                ready_replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let status = DeploymentStatus::from(&deployment);
        assert_eq!(status.desired_replicas, 3);
        assert_eq!(status.ready_replicas, 1);
    }

    #[test]
    fn test_image_tag_defaults_to_latest() {
        let image: ImageConfig =
            serde_yaml::from_str("name: app\nregistry: internal\n").unwrap();
        assert_eq!(image.tag, "latest");
    }
}
