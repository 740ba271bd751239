//! Content extraction: turning fetched bodies into artifacts and new work
//!
//! [`HtmlExtractor`] handles HTML pages. It extracts:
//! - Links to follow (from `<a>` tags and canonical links)
//! - Page title
//!
//! Any other content type is stored as-is with nothing discovered.

use crate::crawler::fetcher::FetchedContent;
use crate::storage::Artifact;
use crate::url::{canonicalize, ResourceId};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// What an extractor produced from one fetched resource
#[derive(Debug, Clone)]
pub struct Extraction {
    pub artifact: Artifact,
    /// Canonical identifiers found in the content, in document order, without duplicates
    pub discovered: Vec<ResourceId>,
}

/// Derives an artifact and newly discovered identifiers from fetched content
///
/// Extraction never fails: content it cannot interpret becomes an artifact
/// with a diagnostic and no discoveries.
pub trait Extractor: Send + Sync {
    fn extract(&self, content: &FetchedContent, source: &ResourceId) -> Extraction;
}

/// Extractor for HTML pages
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Anything that is not http(s) after resolution
///
/// `rel="nofollow"` links are followed.
#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor {
    max_links: Option<usize>,
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of identifiers discovered per page
    pub fn with_max_links(max_links: Option<usize>) -> Self {
        Self { max_links }
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, content: &FetchedContent, source: &ResourceId) -> Extraction {
        let mut artifact = Artifact::new(
            source.clone(),
            content.body.clone(),
            content.content_type.clone(),
        );

        if !is_html(content.content_type.as_deref()) {
            return Extraction {
                artifact,
                discovered: Vec::new(),
            };
        }

        let html = match std::str::from_utf8(&content.body) {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!("Body of {} is not valid UTF-8: {}", source, e);
                artifact.diagnostic = Some(format!("body is not valid UTF-8: {}", e));
                return Extraction {
                    artifact,
                    discovered: Vec::new(),
                };
            }
        };

        let page = parse_html(html, &content.final_url);
        artifact.title = page.title;

        let mut seen = HashSet::new();
        seen.insert(source.clone());

        let limit = self.max_links.unwrap_or(usize::MAX);
        let discovered = page
            .links
            .iter()
            .map(|link| canonicalize(link))
            .filter(|id| seen.insert(id.clone()))
            .take(limit)
            .collect();

        Extraction {
            artifact,
            discovered,
        }
    }
}

/// Returns true when a Content-Type names an HTML document
///
/// A missing header is treated as HTML.
fn is_html(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "text/html" || essence == "application/xhtml+xml"
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All followable links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and the title
///
/// # Example
///
/// ```
/// use skimmer::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should not be followed.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
