use crate::UrlError;
use url::Url;

/// Canonicalizes an item URL so equal listings share one identity key
///
/// # Canonicalization Steps
///
/// 1. Resolve `raw` against `base` (absolute inputs ignore the base)
/// 2. Reject non-HTTP(S) schemes and host-less URLs
/// 3. Lowercase the host (done by the parser)
/// 4. Drop the fragment
/// 5. Remove a trailing slash from non-root paths
/// 6. Remove an empty query string
///
/// # Examples
///
/// ```
/// use listing_harvest::url::canonicalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.redfin.com").unwrap();
/// let url = canonicalize_url("/SC/Myrtle-Beach/home/123/#photos", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.redfin.com/SC/Myrtle-Beach/home/123");
/// ```
pub fn canonicalize_url(raw: &str, base: &Url) -> Result<Url, UrlError> {
    let raw = raw.trim();
    let mut url = base
        .join(raw)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.redfin.com/city/12572/SC/Myrtle-Beach/page-1").unwrap()
    }

    #[test]
    fn test_relative_path_resolved() {
        let url = canonicalize_url("/SC/Myrtle-Beach/123-Ocean-Blvd/home/1", &base()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.redfin.com/SC/Myrtle-Beach/123-Ocean-Blvd/home/1"
        );
    }

    #[test]
    fn test_absolute_url_kept() {
        let url = canonicalize_url("https://other.example.com/a", &base()).unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/a");
    }

    #[test]
    fn test_fragment_and_trailing_slash_removed() {
        let a = canonicalize_url("https://www.redfin.com/home/1/#map", &base()).unwrap();
        let b = canonicalize_url("https://WWW.redfin.com/home/1", &base()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_query_removed() {
        let url = canonicalize_url("https://www.redfin.com/home/1?", &base()).unwrap();
        assert_eq!(url.as_str(), "https://www.redfin.com/home/1");
    }

    #[test]
    fn test_root_path_kept() {
        let url = canonicalize_url("https://www.redfin.com/", &base()).unwrap();
        assert_eq!(url.as_str(), "https://www.redfin.com/");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            canonicalize_url("mailto:agent@example.com", &base()),
            Err(UrlError::InvalidScheme(_))
        ));
    }
}
