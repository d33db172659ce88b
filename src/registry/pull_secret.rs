use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{DOCKER_HUB_ALIAS, DOCKER_HUB_AUTH_URL};
use super::naming::pull_secret_name;
use crate::cluster::{is_not_found, ClusterClient};
use crate::error::{RegistryError, Result};

pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Creates and updates image pull secrets, one per registry URL and namespace
pub struct PullSecretManager {
    cluster: Arc<dyn ClusterClient>,
}

impl PullSecretManager {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Create or update the pull secret for `registry_url` in `namespace`
    ///
    /// The secret holds exactly one registry's credentials, so an existing
    /// secret gets its payload replaced wholesale. Returns the secret name.
    pub async fn ensure(
        &self,
        namespace: &str,
        registry_url: &str,
        username: &str,
        password_or_token: &str,
        email: &str,
    ) -> Result<String> {
        let name = pull_secret_name(registry_url);
        let secret = dockerconfigjson_secret(&name, registry_url, username, password_or_token, email);

        let result = match self.cluster.get_secret(namespace, &name).await {
            Ok(_) => {
                debug!(namespace, secret = %name, "Pull secret exists, replacing");
                self.cluster.replace_secret(namespace, &name, &secret).await
            }
            Err(e) if is_not_found(&e) => {
                debug!(namespace, secret = %name, "Pull secret does not exist, creating");
                self.cluster.create_secret(namespace, &secret).await
            }
            Err(e) => {
                // Unknown state; let create decide whether the secret is there
                debug!(namespace, secret = %name, error = %e, "Pull secret lookup failed, trying create");
                self.cluster.create_secret(namespace, &secret).await
            }
        };

        result.map_err(|e| RegistryError::write("Unable to update image pull secret", e))?;

        info!(
            namespace,
            secret = %name,
            registry = %normalize_registry_url(registry_url),
            "Image pull secret reconciled"
        );
        Ok(name)
    }
}

/// Map the hub alias (or nothing) to the address docker uses for auth lookups
pub fn normalize_registry_url(registry_url: &str) -> &str {
    if registry_url.is_empty() || registry_url == DOCKER_HUB_ALIAS {
        DOCKER_HUB_AUTH_URL
    } else {
        registry_url
    }
}

/// Build a dockerconfigjson Secret holding credentials for a single registry
pub fn dockerconfigjson_secret(
    name: &str,
    registry_url: &str,
    username: &str,
    password_or_token: &str,
    email: &str,
) -> Secret {
    let auth_token = if username.is_empty() {
        password_or_token.to_string()
    } else {
        format!("{}:{}", username, password_or_token)
    };
    let auth = base64::engine::general_purpose::STANDARD.encode(auth_token);

    let mut entry = serde_json::json!({
        "auth": auth,
        "email": email,
    });
    if !username.is_empty() {
        entry["username"] = serde_json::Value::from(username);
        entry["password"] = serde_json::Value::from(password_or_token);
    }

    let registry = normalize_registry_url(registry_url);
    let docker_config = serde_json::json!({
        "auths": {
            registry: entry
        }
    });

    let mut data = BTreeMap::new();
    data.insert(
        DOCKER_CONFIG_JSON_KEY.to_string(),
        k8s_openapi::ByteString(docker_config.to_string().into_bytes()),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        type_: Some(DOCKER_CONFIG_JSON_TYPE.to_string()),
        data: Some(data),
        ..Default::default()
    }
}
