use super::ResourceId;

/// Extracts the host of a resource identifier
///
/// Malformed identifiers have no host and yield `None`. The port is not part
/// of the result, so `127.0.0.1:8080` and `127.0.0.1:9090` share a domain.
///
/// # Examples
///
/// ```
/// use skimmer::url::{canonicalize, extract_domain};
///
/// let id = canonicalize("https://Blog.Example.com/post");
/// assert_eq!(extract_domain(&id), Some("blog.example.com".to_string()));
///
/// let bad = canonicalize("not a url");
/// assert_eq!(extract_domain(&bad), None);
/// ```
pub fn extract_domain(id: &ResourceId) -> Option<String> {
    id.url()
        .and_then(|url| url.host_str())
        .map(|host| host.to_lowercase())
}
