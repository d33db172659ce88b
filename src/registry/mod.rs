pub mod endpoint;
pub mod htpasswd;
pub mod image;
pub mod models;
pub mod namespace;
pub mod naming;
pub mod provisioner;
pub mod pull_secret;
pub mod readiness;

pub use image::image_url;
pub use models::{ImageConfig, InternalRegistryRelease, RegistryConfig};
pub use naming::pull_secret_name;
pub use provisioner::{ProvisionOptions, ProvisionOutcome, RegistryProvisioner};
pub use pull_secret::PullSecretManager;
