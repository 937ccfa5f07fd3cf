use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").expect("valid regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static STREET_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d{1,6}\s+[a-z0-9].+").expect("valid regex"));

/// Canonical form of a listing URL: https, lower-case host, no query, fragment or
/// trailing slash. `canonical_url(canonical_url(x)) == canonical_url(x)`.
pub fn canonical_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    Some(format!("https://{host}{port}{path}"))
}

pub fn url_key(url: &str) -> Option<String> {
    canonical_url(url).map(|canonical| format!("url:{canonical}"))
}

/// Lower-case, strip punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lowered, " ");
    SPACES.replace_all(cleaned.trim(), " ").into_owned()
}

pub fn likely_street_address(text: &str) -> bool {
    STREET_ADDRESS.is_match(text)
}

/// Identity of a listing: its canonical URL, falling back to the street address
/// and then to property name plus city.
pub fn identity_key(url: &str, address: &str, property_name: &str, city: &str) -> Option<String> {
    if let Some(key) = url_key(url) {
        return Some(key);
    }

    let address = normalize_text(address);
    if likely_street_address(&address) {
        return Some(format!("addr:{address}"));
    }

    let name = normalize_text(property_name);
    let city = normalize_text(city);
    if !name.is_empty() && !city.is_empty() {
        return Some(format!("namecity:{name}|{city}"));
    }
    None
}
