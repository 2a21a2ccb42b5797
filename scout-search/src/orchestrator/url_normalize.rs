//! URL normalisation for deduplication and candidate grouping.
//!
//! Provider URLs arrive in many shapes for the same page: mixed case,
//! with or without `www.`, trailing slashes, fragments, tracking
//! parameters, even without a scheme. Everything here canonicalises
//! them so equivalent pages compare equal.

use url::Url;

/// Tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "si",
];

/// Parse a provider URL, tolerating a missing scheme.
///
/// Only `http`/`https` URLs with a host are accepted; anything else
/// (`mailto:`, `javascript:`, garbage) yields `None`.
pub fn parse_lenient(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        // `example.com:8080/x` parses with scheme `example.com`.
        Ok(url) if url.cannot_be_a_base() && url.scheme().contains('.') => {
            Url::parse(&format!("https://{trimmed}")).ok()?
        }
        Ok(_) => return None,
        Err(_) => Url::parse(&format!("https://{trimmed}")).ok()?,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(parsed)
}

/// Lower-cased host with a leading `www.` removed.
pub fn bare_hostname(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.trim_end_matches('.');
    (!host.is_empty()).then(|| host.to_owned())
}

/// `bare-host/path` form of a URL, without scheme, query, fragment or
/// trailing slash. The root path collapses to the bare host.
pub fn hostname_and_path(raw: &str) -> Option<String> {
    let url = parse_lenient(raw)?;
    let host = bare_hostname(&url)?;
    let path = url.path().trim_end_matches('/');
    Some(format!("{host}{path}"))
}

/// Normalise a URL into a deduplication key.
///
/// 1. Lowercase host, strip `www.`, drop the scheme and default ports.
/// 2. Remove the fragment and known tracking parameters.
/// 3. Sort the remaining query parameters.
/// 4. Remove the trailing slash from the path.
///
/// Unparseable input falls back to its trimmed, lower-cased form so two
/// identical junk strings still collapse.
///
/// ```
/// use scout_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://WWW.Qonto.com/fr/?utm_source=x#top");
/// let b = normalize_url("http://qonto.com/fr");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let Some(url) = parse_lenient(raw) else {
        return raw.trim().to_lowercase();
    };
    let Some(host) = bare_hostname(&url) else {
        return raw.trim().to_lowercase();
    };

    let mut key = host;
    // `Url::port` is already `None` for the scheme's default port.
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(url.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let qs = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&qs);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_parse_adds_scheme() {
        let url = parse_lenient("pennylane.com/fr").expect("parses");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("pennylane.com"));
    }

    #[test]
    fn lenient_parse_rejects_non_web_urls() {
        assert!(parse_lenient("").is_none());
        assert!(parse_lenient("   ").is_none());
        assert!(parse_lenient("mailto:founders@alan.com").is_none());
        assert!(parse_lenient("ftp://files.example.com").is_none());
        assert!(parse_lenient("not a url at all").is_none());
    }

    #[test]
    fn bare_hostname_strips_www_and_case() {
        let url = parse_lenient("https://WWW.Swile.CO/").expect("parses");
        assert_eq!(bare_hostname(&url).as_deref(), Some("swile.co"));
    }

    #[test]
    fn hostname_and_path_drops_scheme_query_and_slash() {
        assert_eq!(
            hostname_and_path("https://www.qonto.com/fr/pricing/?plan=solo").as_deref(),
            Some("qonto.com/fr/pricing")
        );
        assert_eq!(
            hostname_and_path("http://qonto.com/").as_deref(),
            Some("qonto.com")
        );
    }

    #[test]
    fn normalize_collapses_www_scheme_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://www.example.com/path/"),
            normalize_url("http://example.com/path")
        );
    }

    #[test]
    fn normalize_strips_tracking_and_fragment() {
        assert_eq!(
            normalize_url("https://example.com/page?q=rust&utm_source=x&fbclid=y#s"),
            "example.com/page?q=rust"
        );
    }

    #[test]
    fn normalize_sorts_query_params() {
        assert_eq!(
            normalize_url("https://example.com/s?z=1&a=2"),
            "example.com/s?a=2&z=1"
        );
    }

    #[test]
    fn normalize_keeps_non_default_port() {
        assert_eq!(
            normalize_url("https://example.com:8443/x"),
            "example.com:8443/x"
        );
        assert_eq!(normalize_url("https://example.com:443/x"), "example.com/x");
    }

    #[test]
    fn normalize_unparseable_falls_back_to_lowercase() {
        assert_eq!(normalize_url("  Not A URL "), "not a url");
    }
}
