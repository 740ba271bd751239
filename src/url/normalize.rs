use crate::UrlError;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// List of tracking query parameters to remove during canonicalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Canonical, immutable key for a crawlable resource
///
/// Two identifiers are equal when their canonical strings are equal. The parsed
/// URL is kept alongside for fetching; it is `None` when the raw input could not
/// be understood as an absolute http(s) URL.
#[derive(Debug, Clone)]
pub struct ResourceId {
    canonical: String,
    url: Option<Url>,
}

impl ResourceId {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Returns the parsed URL, if the identifier is well-formed
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Returns true if the raw input could not be parsed into a fetchable URL
    pub fn is_malformed(&self) -> bool {
        self.url.is_none()
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Canonicalizes a raw identifier
///
/// This never fails. Input that is not an absolute http(s) URL with a host
/// produces a malformed identifier keyed by the trimmed input, which the
/// fetcher later reports as a permanent failure.
///
/// # Canonicalization Steps
///
/// 1. Trim surrounding whitespace and parse
/// 2. Lowercase the host and drop the default port (done by the parser)
/// 3. Resolve dot segments, collapse repeated slashes
/// 4. Remove the trailing slash (except for the root `/`)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters, sort the rest, drop an empty query
///
/// # Examples
///
/// ```
/// use skimmer::url::canonicalize;
///
/// let a = canonicalize("https://Example.com/page/#top");
/// let b = canonicalize("https://example.com/page");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "https://example.com/page");
/// ```
pub fn canonicalize(raw: &str) -> ResourceId {
    let trimmed = raw.trim();

    match canonical_url(trimmed) {
        Ok(url) => ResourceId {
            canonical: url.as_str().to_string(),
            url: Some(url),
        },
        Err(e) => {
            tracing::trace!("Treating {:?} as malformed identifier: {}", trimmed, e);
            ResourceId {
                canonical: trimmed.to_string(),
                url: None,
            }
        }
    }
}

/// Parses and normalizes an absolute http(s) URL
pub fn canonical_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingHost),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by collapsing empty and dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
