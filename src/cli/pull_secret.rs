use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::cluster::KubeCluster;
use crate::error::RegistryError;
use crate::registry::PullSecretManager;
use crate::settings::Settings;

#[derive(Debug, Clone, clap::Args)]
pub struct PullSecretArgs {
    /// Namespace to create the pull secret in
    #[arg(long, short)]
    pub namespace: String,
    /// Name of a configured registry to take the URL and credentials from
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub registry: Option<String>,
    /// Registry URL, when not using a configured registry
    #[arg(long)]
    pub url: Option<String>,
    /// Username (omit when authenticating with a bare token)
    #[arg(long)]
    pub username: Option<String>,
    /// Password or token
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long, default_value = "")]
    pub email: String,
}

/// Registry address and credentials to write into a pull secret
#[derive(Debug, PartialEq)]
struct PullSecretCredentials {
    url: String,
    username: String,
    password: String,
}

/// Flags given on the command line win over the registry's configured auth
fn resolve_credentials(args: &PullSecretArgs, settings: Option<&Settings>) -> Result<PullSecretCredentials> {
    let (url, auth) = match (&args.registry, &args.url) {
        (Some(name), _) => {
            let settings = settings.context("A configuration is required to use --registry")?;
            let registry = settings
                .registries
                .get(name)
                .ok_or_else(|| RegistryError::RegistryNotFound(name.clone()))?;
            (registry.url.clone().unwrap_or_default(), registry.auth.clone())
        }
        (None, Some(url)) => (url.clone(), None),
        (None, None) => bail!("Either --registry or --url is required"),
    };

    let username = args
        .username
        .clone()
        .or_else(|| auth.as_ref().map(|a| a.username.clone()))
        .unwrap_or_default();
    let password = args
        .password
        .clone()
        .or_else(|| auth.map(|a| a.password))
        .context("No password or token given; pass --password or configure registry auth")?;

    Ok(PullSecretCredentials {
        url,
        username,
        password,
    })
}

pub async fn create_pull_secret(args: &PullSecretArgs, settings: Option<&Settings>) -> Result<()> {
    let credentials = resolve_credentials(args, settings)?;

    let cluster = KubeCluster::connect()
        .await
        .context("Failed to connect to Kubernetes cluster")?;
    let manager = PullSecretManager::new(Arc::new(cluster));

    let name = manager
        .ensure(
            &args.namespace,
            &credentials.url,
            &credentials.username,
            &credentials.password,
            &args.email,
        )
        .await?;

    println!("✓ Image pull secret '{}' is up to date in namespace '{}'", name, args.namespace);
    Ok(())
}
