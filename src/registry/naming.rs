/// Prefix of every pull secret this tool manages
pub const PULL_SECRET_NAME_PREFIX: &str = "rise-registry-auth-";

/// Get the image pull secret name for a registry URL
///
/// The name is the prefix followed by the hex MD5 digest of the URL, so the
/// same URL always maps to the same secret and the result is a valid
/// Kubernetes object name for any input.
pub fn pull_secret_name(registry_url: &str) -> String {
    format!(
        "{}{:x}",
        PULL_SECRET_NAME_PREFIX,
        md5::compute(registry_url.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_secret_name_is_stable() {
        let url = "registry.example.com:5000";
        assert_eq!(pull_secret_name(url), pull_secret_name(url));
    }

    #[test]
    fn test_pull_secret_name_known_digest() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(
            pull_secret_name(""),
            "rise-registry-auth-d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_pull_secret_name_differs_per_url() {
        let urls = [
            "hub.docker.com",
            "10.0.0.12:5000",
            "10.0.0.13:5000",
            "registry.example.com",
            "https://index.docker.io/v1/",
        ];
        let names: std::collections::HashSet<_> =
            urls.iter().map(|u| pull_secret_name(u)).collect();
        assert_eq!(names.len(), urls.len());
    }

    #[test]
    fn test_pull_secret_name_is_valid_object_name() {
        let name = pull_secret_name("Some Weird/URL?with=chars");
        assert!(name.len() <= 253);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }
}
