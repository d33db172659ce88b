use std::collections::BTreeMap;

use super::models::{ImageConfig, RegistryConfig, DOCKER_HUB_ALIAS};
use crate::error::{RegistryError, Result};

/// Fully qualified reference for `image`, e.g. `registry.local/app:v1`
///
/// Images on the public registry (no URL, or the hub alias) are left
/// unprefixed so the container runtime applies its own default.
pub fn image_url(
    image: &ImageConfig,
    registries: &BTreeMap<String, RegistryConfig>,
    include_tag: bool,
) -> Result<String> {
    let registry = registries
        .get(&image.registry)
        .ok_or_else(|| RegistryError::RegistryNotFound(image.registry.clone()))?;

    let mut url = match registry.url.as_deref() {
        None | Some("") | Some(DOCKER_HUB_ALIAS) => image.name.clone(),
        Some(prefix) => format!("{}/{}", prefix, image.name),
    };

    if include_tag {
        url.push(':');
        url.push_str(&image.tag);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageConfig {
        ImageConfig {
            name: "app".to_string(),
            tag: "v1".to_string(),
            registry: "r".to_string(),
        }
    }

    fn registries(url: Option<&str>) -> BTreeMap<String, RegistryConfig> {
        let mut map = BTreeMap::new();
        map.insert(
            "r".to_string(),
            RegistryConfig {
                url: url.map(str::to_string),
                ..Default::default()
            },
        );
        map
    }

    #[test]
    fn test_private_registry_with_tag() {
        let url = image_url(&image(), &registries(Some("myregistry.local")), true).unwrap();
        assert_eq!(url, "myregistry.local/app:v1");
    }

    #[test]
    fn test_without_tag() {
        let url = image_url(&image(), &registries(Some("10.96.0.20:5000")), false).unwrap();
        assert_eq!(url, "10.96.0.20:5000/app");
    }

    #[test]
    fn test_public_registry_is_not_prefixed() {
        assert_eq!(image_url(&image(), &registries(None), true).unwrap(), "app:v1");
        assert_eq!(image_url(&image(), &registries(Some("")), true).unwrap(), "app:v1");
        assert_eq!(
            image_url(&image(), &registries(Some("hub.docker.com")), false).unwrap(),
            "app"
        );
    }

    #[test]
    fn test_unknown_registry() {
        let err = image_url(&image(), &BTreeMap::new(), true).unwrap_err();
        assert!(matches!(err, RegistryError::RegistryNotFound(ref name) if name == "r"));
    }
}
