use thiserror::Error;

/// Errors surfaced by the registry provisioning workflow.
///
/// Every step wraps its underlying cause with a short description and returns
/// immediately. Nothing is rolled back when a later step fails: the steps are
/// idempotent, so re-running the whole workflow is the recovery path.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{what}: {source}")]
    ResourceRead {
        what: String,
        #[source]
        source: kube::Error,
    },

    #[error("{what}: {source}")]
    ResourceWrite {
        what: String,
        #[source]
        source: kube::Error,
    },

    #[error("Unable to initialize docker registry: {0}")]
    Install(#[source] anyhow::Error),

    #[error("Unable to set password in htpasswd: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Timeout waiting for registry service {service} to get a cluster address")]
    ServiceWaitTimeout { service: String },

    #[error("Timeout waiting for registry deployment {deployment} to become ready")]
    ReadinessTimeout { deployment: String },

    #[error("Unable to find registry: {0}")]
    RegistryNotFound(String),

    #[error("Cancelled while {0}")]
    Cancelled(String),
}

impl RegistryError {
    pub(crate) fn read(what: impl Into<String>, source: kube::Error) -> Self {
        Self::ResourceRead {
            what: what.into(),
            source,
        }
    }

    pub(crate) fn write(what: impl Into<String>, source: kube::Error) -> Self {
        Self::ResourceWrite {
            what: what.into(),
            source,
        }
    }

    /// Whether retrying later could succeed without any configuration change.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ServiceWaitTimeout { .. } | Self::ReadinessTimeout { .. } | Self::Cancelled(_)
        )
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_distinguished() {
        assert!(RegistryError::ServiceWaitTimeout {
            service: "r-docker-registry".to_string()
        }
        .is_timeout());
        assert!(RegistryError::ReadinessTimeout {
            deployment: "r-docker-registry".to_string()
        }
        .is_timeout());
        assert!(!RegistryError::RegistryNotFound("default".to_string()).is_timeout());
        assert!(!RegistryError::Install(anyhow::anyhow!("chart not found")).is_timeout());
    }

    #[test]
    fn test_registry_not_found_message() {
        let err = RegistryError::RegistryNotFound("internal".to_string());
        assert_eq!(err.to_string(), "Unable to find registry: internal");
    }
}
