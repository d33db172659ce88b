use anyhow::{Context, Result};

use crate::registry::{image_url, pull_secret_name};
use crate::settings::Settings;

/// Fully qualified reference of the configured image `name`
pub fn resolve_image_url(settings: &Settings, name: &str, include_tag: bool) -> Result<String> {
    let image = settings
        .images
        .get(name)
        .with_context(|| format!("Unknown image '{}'", name))?;
    Ok(image_url(image, &settings.registries, include_tag)?)
}

pub fn print_image_url(settings: &Settings, name: &str, include_tag: bool) -> Result<()> {
    println!("{}", resolve_image_url(settings, name, include_tag)?);
    Ok(())
}

pub fn print_secret_name(registry_url: &str) {
    println!("{}", pull_secret_name(registry_url));
}

/// Load configuration and report whether it is valid
pub fn check_config() -> Result<()> {
    println!("Checking registry configuration...");
    match Settings::new() {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!(
                "  {} registries, {} images, internal registry: {}",
                settings.registries.len(),
                settings.images.len(),
                settings
                    .internal_registry
                    .as_ref()
                    .map(|i| i.registry.as_str())
                    .unwrap_or("none")
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
