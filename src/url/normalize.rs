use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during canonicalisation
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
];

/// Canonicalises an absolute URL so that it can serve as a novel's identity key
///
/// # Canonicalisation Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an HTTP(S) scheme and a host
/// 3. Lowercase the host (done by the parser for HTTP(S))
/// 4. Remove fragment
/// 5. Remove tracking query parameters and sort the rest
/// 6. Remove empty query string
///
/// The path is left as the source published it, since the canonical URL is
/// also the URL the detail page is fetched from.
///
/// # Examples
///
/// ```
/// use novel_crawler::url::canonicalize_url;
///
/// let url = canonicalize_url("https://Example.COM/novel/abc?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/novel/abc");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

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

/// Resolves an `href` found on a source page against the source's base URL
///
/// Returns `None` for links that can never point at a page:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - anything that does not resolve to an HTTP(S) URL
///
/// The result is canonicalised with [`canonicalize_url`].
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    canonicalize_url(absolute.as_str()).ok()
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.lightnovelworld.com").unwrap()
    }

    #[test]
    fn test_resolve_relative_link() {
        let url = resolve_link("/novel/shadow-slave", &base_url()).unwrap();
        assert_eq!(url.as_str(), "https://www.lightnovelworld.com/novel/shadow-slave");
    }

    #[test]
    fn test_resolve_absolute_link_keeps_host() {
        let url = resolve_link("https://mirror.example.org/n/1", &base_url()).unwrap();
        assert_eq!(url.as_str(), "https://mirror.example.org/n/1");
    }

    #[test]
    fn test_resolve_relative_path_link() {
        let base = Url::parse("https://example.com/novel/abc/").unwrap();
        let url = resolve_link("chapter-1", &base).unwrap();
        assert_eq!(url.as_str(), "https://example.com/novel/abc/chapter-1");
    }

    #[test]
    fn test_skip_non_page_links() {
        for href in ["", "   ", "#top", "javascript:void(0)", "mailto:a@b.c", "tel:123", "data:text/html,x"] {
            assert!(resolve_link(href, &base_url()).is_none(), "should skip {:?}", href);
        }
    }

    #[test]
    fn test_same_novel_different_spellings_share_key() {
        let a = resolve_link("/novel/abc?utm_source=home#comments", &base_url()).unwrap();
        let b = resolve_link("https://WWW.LIGHTNOVELWORLD.COM/novel/abc", &base_url()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_remove_fragment() {
        let result = canonicalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = canonicalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_mixed_query_params() {
        let result =
            canonicalize_url("https://example.com/page?keep=yes&utm_medium=email&fbclid=123")
                .unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?keep=yes");
    }

    #[test]
    fn test_http_is_kept() {
        let result = canonicalize_url("http://127.0.0.1:8080/novel/a").unwrap();
        assert_eq!(result.as_str(), "http://127.0.0.1:8080/novel/a");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = canonicalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(
            canonicalize_url("not a url").unwrap_err(),
            UrlError::Parse(_)
        ));
    }
}
