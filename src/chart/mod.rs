// Chart installation (helm)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Installs a chart release into the cluster
#[async_trait]
pub trait ChartInstaller: Send + Sync {
    /// Install (or upgrade) `release` from `chart` into `namespace`
    ///
    /// An empty `version` means the latest version of the chart.
    async fn install(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        version: &str,
        values: Option<&serde_yaml::Value>,
    ) -> Result<()>;
}

/// [`ChartInstaller`] that runs the helm CLI
pub struct HelmCli {
    binary: String,
}

impl HelmCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Arguments for an idempotent `helm upgrade --install`
fn helm_args(
    release: &str,
    namespace: &str,
    chart: &str,
    version: &str,
    values_file: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        release.to_string(),
        chart.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ];
    if !version.is_empty() {
        args.push("--version".to_string());
        args.push(version.to_string());
    }
    if let Some(path) = values_file {
        args.push("--values".to_string());
        args.push(path.display().to_string());
    }
    args
}

#[async_trait]
impl ChartInstaller for HelmCli {
    async fn install(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        version: &str,
        values: Option<&serde_yaml::Value>,
    ) -> Result<()> {
        info!(release, namespace, chart, "Installing chart");

        // Kept alive until helm has read it
        let values_file = match values {
            Some(values) => {
                let mut file = tempfile::Builder::new()
                    .prefix("rise-registry-values-")
                    .suffix(".yaml")
                    .tempfile()
                    .context("Failed to create values file")?;
                let yaml = serde_yaml::to_string(values).context("Failed to serialize chart values")?;
                file.write_all(yaml.as_bytes())
                    .context("Failed to write values file")?;
                Some(file)
            }
            None => None,
        };

        let args = helm_args(
            release,
            namespace,
            chart,
            version,
            values_file.as_ref().map(|f| f.path()),
        );
        debug!("Executing command: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.binary))?;

        if !output.status.success() {
            bail!(
                "{} upgrade --install failed with status {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!(release, namespace, "Chart installed");
        Ok(())
    }
}
