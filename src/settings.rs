use anyhow::Context;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::{ImageConfig, InternalRegistryRelease, ProvisionOptions, RegistryConfig};

/// File written by `ensure`, loaded as a layer on later runs
pub const GENERATED_CONFIG_NAME: &str = "generated";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Configured registries by name
    #[serde(default)]
    pub registries: BTreeMap<String, RegistryConfig>,
    /// Images by name; each references one of `registries`
    #[serde(default)]
    pub images: BTreeMap<String, ImageConfig>,
    #[serde(default)]
    pub internal_registry: Option<InternalRegistrySettings>,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
    #[serde(skip)]
    config_dir: PathBuf,
}

/// The registry this tool deploys into the cluster
#[derive(Debug, Deserialize, Clone)]
pub struct InternalRegistrySettings {
    pub release: InternalRegistryRelease,
    /// Entry in `registries` that receives the resolved endpoint
    pub registry: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvisioningSettings {
    #[serde(default = "default_chart")]
    pub chart: String,
    /// Empty means latest
    #[serde(default)]
    pub chart_version: String,
    #[serde(default = "default_registry_port")]
    pub registry_port: u16,
    #[serde(default = "default_service_wait")]
    pub service_wait_secs: u64,
    #[serde(default = "default_service_poll_interval")]
    pub service_poll_interval_secs: u64,
    #[serde(default = "default_readiness_wait")]
    pub readiness_wait_secs: u64,
    #[serde(default = "default_readiness_poll_interval")]
    pub readiness_poll_interval_secs: u64,
    #[serde(default = "default_helm_binary")]
    pub helm_binary: String,
}

fn default_chart() -> String {
    "stable/docker-registry".to_string()
}

fn default_registry_port() -> u16 {
    5000
}

fn default_service_wait() -> u64 {
    60
}

fn default_service_poll_interval() -> u64 {
    3
}

fn default_readiness_wait() -> u64 {
    120
}

fn default_readiness_poll_interval() -> u64 {
    5
}

fn default_helm_binary() -> String {
    "helm".to_string()
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            chart: default_chart(),
            chart_version: String::new(),
            registry_port: default_registry_port(),
            service_wait_secs: default_service_wait(),
            service_poll_interval_secs: default_service_poll_interval(),
            readiness_wait_secs: default_readiness_wait(),
            readiness_poll_interval_secs: default_readiness_poll_interval(),
            helm_binary: default_helm_binary(),
        }
    }
}

impl ProvisioningSettings {
    pub fn provision_options(&self) -> ProvisionOptions {
        ProvisionOptions {
            chart: self.chart.clone(),
            chart_version: self.chart_version.clone(),
            registry_port: self.registry_port,
            service_wait: Duration::from_secs(self.service_wait_secs),
            service_poll_interval: Duration::from_secs(self.service_poll_interval_secs),
            readiness_wait: Duration::from_secs(self.readiness_wait_secs),
            readiness_poll_interval: Duration::from_secs(self.readiness_poll_interval_secs),
        }
    }
}

/// Shape of the generated layer: endpoints only, never credentials
#[derive(Debug, Default, Serialize, Deserialize)]
struct GeneratedSettings {
    #[serde(default)]
    registries: BTreeMap<String, GeneratedRegistry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeneratedRegistry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insecure: Option<bool>,
}

/// Extensions tried for each config layer, first match wins
const CONFIG_EXTENSIONS: [&str; 3] = ["toml", "yaml", "yml"];

lazy_static::lazy_static! {
    /// `${NAME}` or `${NAME:-fallback}`
    static ref ENV_REFERENCE: Option<regex::Regex> =
        regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").ok();
}

/// Expand `${NAME}` / `${NAME:-fallback}` references from the process environment
fn expand_env_refs(raw: &str) -> String {
    match ENV_REFERENCE.as_ref() {
        Some(pattern) => pattern
            .replace_all(raw, |caps: &regex::Captures| {
                env::var(&caps[1]).unwrap_or_else(|_| {
                    caps.get(2).map_or_else(String::new, |m| m.as_str().to_string())
                })
            })
            .into_owned(),
        None => raw.to_string(),
    }
}

/// Expand environment references in every string of a loaded config tree
fn expand_env_refs_in_tree(node: &mut serde_json::Value) {
    match node {
        serde_json::Value::String(text) if text.contains("${") => *text = expand_env_refs(text),
        serde_json::Value::Array(items) => items.iter_mut().for_each(expand_env_refs_in_tree),
        serde_json::Value::Object(fields) => fields.values_mut().for_each(expand_env_refs_in_tree),
        _ => {}
    }
}

/// `<dir>/<layer>.<ext>` for the first extension that exists
fn find_config_file(config_dir: &Path, layer: &str) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("{}.{}", layer, ext)))
        .find(|candidate| candidate.is_file())
}

impl Settings {
    /// Load settings from the directory and run mode named by the environment
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode =
            env::var("RISE_REGISTRY_CONFIG_RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("RISE_REGISTRY_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        Self::load_from(Path::new(&config_dir), &run_mode)
    }

    pub fn load_from(config_dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        let defaults = find_config_file(config_dir, "default").ok_or_else(|| {
            ConfigError::Message(format!(
                "Required config file not found: {}/default.{{toml,yaml,yml}}",
                config_dir.display()
            ))
        })?;

        let mut layers = vec![defaults];
        // `local` is not checked into git; `generated` is written by `ensure`
        for layer in [run_mode, "local", GENERATED_CONFIG_NAME] {
            match find_config_file(config_dir, layer) {
                Some(path) => layers.push(path),
                None => tracing::debug!(
                    "No optional {} config in {}",
                    layer,
                    config_dir.display()
                ),
            }
        }

        let builder = layers.iter().fold(Config::builder(), |builder, path| {
            tracing::info!("Loading config file: {}", path.display());
            builder.add_source(config::File::from(path.as_path()))
        });

        let mut tree: serde_json::Value = builder
            .add_source(
                Environment::with_prefix("RISE_REGISTRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        expand_env_refs_in_tree(&mut tree);

        let mut unused_fields = Vec::new();
        let mut settings: Settings = serde_ignored::deserialize(tree, |path| {
            unused_fields.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field: {}", field);
        }

        settings.config_dir = config_dir.to_path_buf();
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(internal) = &self.internal_registry {
            if !self.registries.contains_key(&internal.registry) {
                return Err(ConfigError::Message(format!(
                    "internal_registry references unknown registry '{}'",
                    internal.registry
                )));
            }
            if internal.release.name.is_empty() || internal.release.namespace.is_empty() {
                return Err(ConfigError::Message(
                    "internal_registry.release requires a name and a namespace".to_string(),
                ));
            }
        }

        for (name, image) in &self.images {
            if !self.registries.contains_key(&image.registry) {
                return Err(ConfigError::Message(format!(
                    "Image '{}' references unknown registry '{}'",
                    name, image.registry
                )));
            }
        }

        let provisioning = &self.provisioning;
        for (field, value) in [
            ("service_poll_interval_secs", provisioning.service_poll_interval_secs),
            ("readiness_poll_interval_secs", provisioning.readiness_poll_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "provisioning.{} must be greater than zero",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Record a registry's resolved endpoint in the generated config layer
    ///
    /// Other entries already in the file are kept. Credentials are never
    /// written. Returns the path of the file.
    pub fn persist_endpoint(&self, name: &str, registry: &RegistryConfig) -> anyhow::Result<PathBuf> {
        let path = self
            .config_dir
            .join(format!("{}.yaml", GENERATED_CONFIG_NAME));

        let mut generated: GeneratedSettings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_yaml::from_str::<Option<GeneratedSettings>>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
                .unwrap_or_default()
        } else {
            GeneratedSettings::default()
        };

        generated.registries.insert(
            name.to_string(),
            GeneratedRegistry {
                url: registry.url.clone(),
                insecure: registry.insecure,
            },
        );

        let yaml = serde_yaml::to_string(&generated).context("Failed to serialize generated config")?;
        std::fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create {}", self.config_dir.display()))?;
        std::fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!("Saved registry '{}' endpoint to {}", name, path.display());
        Ok(path)
    }
}
