use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

/// Characters left alone by `encodeURI`.
const URI_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'#');

/// Escapes `decodeURI` must keep encoded.
const RESERVED: &[u8] = b";/?:@&=+$,#";

/// Percent-encode a whole URI, keeping its structural characters intact.
pub fn encode_uri(value: &str) -> String {
    utf8_percent_encode(value, URI_SET).to_string()
}

/// Decode a whole URI. Escapes of reserved characters are kept. Returns
/// `None` for malformed escapes or invalid UTF-8.
pub fn decode_uri(value: &str) -> Option<String> {
    decode(value, true)
}

/// Decode a single URI component. Returns `None` for malformed escapes or
/// invalid UTF-8.
pub fn decode_uri_component(value: &str) -> Option<String> {
    decode(value, false)
}

fn decode(value: &str, keep_reserved: bool) -> Option<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let hex = bytes.get(i + 1..i + 3)?;
        let hex = std::str::from_utf8(hex).ok()?;
        let byte = u8::from_str_radix(hex, 16).ok()?;

        if keep_reserved && RESERVED.contains(&byte) {
            out.extend_from_slice(&bytes[i..i + 3]);
        } else {
            out.push(byte);
        }

        i += 3;
    }

    String::from_utf8(out).ok()
}

/// Resolve `url` against `base`. Urls that cannot be resolved are returned
/// unchanged.
pub fn make_absolute(url: &str, base: Option<&str>) -> String {
    if Url::parse(url).is_ok() {
        return url.to_owned();
    }

    base.and_then(|base| Url::parse(base).ok())
        .and_then(|base| base.join(url).ok())
        .map(String::from)
        .unwrap_or_else(|| url.to_owned())
}

/// Path part of a url, always with a leading slash.
pub fn request_path(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(url) => url.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };

    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

/// Storage key part for a page url: query string, hash and base href are
/// stripped so that every way of reaching the same page yields the same key.
///
/// Normalisation is idempotent: feeding the result back in returns it
/// unchanged.
pub fn normalize_state_url(url: &str, base: Option<&str>) -> String {
    let base = base.and_then(|base| Url::parse(base).ok());
    let absolute = match &base {
        Some(base) => base.join(url).ok(),
        None => Url::parse(url).ok(),
    };

    let relative = match absolute {
        Some(mut absolute) => {
            absolute.set_query(None);
            absolute.set_fragment(None);

            let stripped = base.as_ref().and_then(|base| {
                let mut base = base.clone();
                base.set_query(None);
                base.set_fragment(None);
                absolute
                    .as_str()
                    .strip_prefix(base.as_str())
                    .map(str::to_owned)
            });

            stripped.unwrap_or_else(|| absolute.path().to_owned())
        }
        None => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };

    relative.trim_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://cms.test/";

    #[test]
    fn normalization_strips_query_hash_and_base() {
        assert_eq!(
            normalize_state_url("http://cms.test/admin/pages/edit/show/5?x=1#tab", Some(BASE)),
            "admin/pages/edit/show/5"
        );
        assert_eq!(normalize_state_url("/admin/pages/", Some(BASE)), "admin/pages");
        assert_eq!(normalize_state_url("admin/pages?q=2", Some(BASE)), "admin/pages");
        assert_eq!(normalize_state_url("/admin/foo?a#b", None), "admin/foo");
    }

    #[test]
    fn normalization_is_idempotent() {
        for url in [
            "http://cms.test/admin/foo?bar=1",
            "/admin/foo#x",
            "admin/foo/",
            "http://cms.test/sub/admin",
        ] {
            for base in [Some(BASE), Some("http://cms.test/sub/"), None] {
                let once = normalize_state_url(url, base);
                assert_eq!(normalize_state_url(&once, base), once, "{url} {base:?}");
            }
        }
    }

    #[test]
    fn encode_keeps_structure() {
        assert_eq!(encode_uri("/admin/pages?q=a b&x=ü"), "/admin/pages?q=a%20b&x=%C3%BC");
    }

    #[test]
    fn decode_uri_keeps_reserved_escapes() {
        assert_eq!(decode_uri("/a%20b%2Fc").as_deref(), Some("/a b%2Fc"));
        assert_eq!(decode_uri("%zz"), None);
        assert_eq!(decode_uri("%E0%A4%A"), None);
        assert_eq!(decode_uri_component("a%2Fb%20c").as_deref(), Some("a/b c"));
    }

    #[test]
    fn request_path_drops_origin_and_query() {
        assert_eq!(request_path("http://cms.test/admin/pages?x=1"), "/admin/pages");
        assert_eq!(request_path("admin/pages#main"), "/admin/pages");
        assert_eq!(request_path(""), "/");
    }

    #[test]
    fn absolute_urls_resolve_against_base() {
        assert_eq!(make_absolute("admin/login", Some(BASE)), "http://cms.test/admin/login");
        assert_eq!(make_absolute("https://elsewhere/x", Some(BASE)), "https://elsewhere/x");
        assert_eq!(make_absolute("admin", None), "admin");
    }
}
