use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info};

use crate::cluster::{is_conflict, is_not_found, ClusterClient};
use crate::error::{RegistryError, Result};

/// Make sure `namespace` exists, creating it if needed
///
/// Lookup errors other than 404 are not told apart: we go ahead and try to
/// create, and a create answered with 409 means someone else got there first.
pub async fn ensure_namespace(cluster: &dyn ClusterClient, namespace: &str) -> Result<()> {
    match cluster.get_namespace(namespace).await {
        Ok(_) => {
            debug!(namespace, "Namespace already exists");
            return Ok(());
        }
        Err(e) if is_not_found(&e) => {}
        Err(e) => debug!(namespace, error = %e, "Namespace lookup failed, trying to create"),
    }

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    match cluster.create_namespace(&ns).await {
        Ok(_) => {
            info!(namespace, "Created namespace");
            Ok(())
        }
        Err(e) if is_conflict(&e) => {
            debug!(namespace, "Namespace appeared while creating it");
            Ok(())
        }
        Err(e) => Err(RegistryError::write(
            format!("Unable to create namespace {}", namespace),
            e,
        )),
    }
}
