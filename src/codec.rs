use http::header::{self, HeaderMap, HeaderValue};
use std::sync::Arc;

/// MIME type prefixes compressed by default.
///
/// Binary formats like images, video and woff2 are already compressed and
/// are left out on purpose; SVG is text and stays in.
pub const DEFAULT_COMPRESSIBLE_TYPES: &[&str] = &[
    "text/",
    "application/json",
    "application/javascript",
    "application/xml",
    "application/xhtml+xml",
    "image/svg+xml",
];

/// Returns true if any `Accept-Encoding` value mentions gzip.
///
/// This is a plain byte substring match. Quality values are not parsed, so
/// `gzip;q=0` still counts as accepting gzip.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .any(|v| v.as_bytes().windows(4).any(|w| w == b"gzip"))
}

/// An ordered set of MIME type prefixes eligible for compression.
#[derive(Debug, Clone)]
pub struct CompressibleTypes {
    prefixes: Arc<[String]>,
}

impl CompressibleTypes {
    /// Creates a set from the given prefixes.
    ///
    /// Prefixes are lowercased so that matching is case-insensitive.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Returns the configured prefixes in order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    /// Returns true if the content type starts with one of the prefixes.
    pub fn matches(&self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        self.prefixes.iter().any(|p| ct.starts_with(p.as_str()))
    }

    /// Classifies a response by its `Content-Type` header.
    ///
    /// A missing or non-UTF-8 value is not compressible.
    pub fn is_compressible(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| self.matches(ct))
    }
}

impl Default for CompressibleTypes {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSIBLE_TYPES)
    }
}

/// Adds Accept-Encoding to the Vary header if not already present.
pub(crate) fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(header::VARY, HeaderValue::from_static("accept-encoding"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers<I>(pairs: I) -> HeaderMap
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_accepts_gzip_simple() {
        assert!(accepts_gzip(&headers([("accept-encoding", "gzip")])));
        assert!(accepts_gzip(&headers([(
            "accept-encoding",
            "gzip, deflate, br"
        )])));
        assert!(accepts_gzip(&headers([("accept-encoding", "br;q=1.0, gzip;q=0.8")])));
    }

    #[test]
    fn test_accepts_gzip_missing_or_other() {
        assert!(!accepts_gzip(&HeaderMap::new()));
        assert!(!accepts_gzip(&headers([("accept-encoding", "br, deflate")])));
        assert!(!accepts_gzip(&headers([("accept-encoding", "identity")])));
    }

    #[test]
    fn test_accepts_gzip_any_of_multiple_values() {
        assert!(accepts_gzip(&headers([
            ("accept-encoding", "br"),
            ("accept-encoding", "gzip"),
        ])));
    }

    #[test]
    fn test_accepts_gzip_with_obs_text() {
        let mut map = HeaderMap::new();
        map.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_bytes(b"gzip, x-\xe9").unwrap(),
        );
        assert!(accepts_gzip(&map));

        map.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_bytes(b"br, x-\xe9").unwrap(),
        );
        assert!(!accepts_gzip(&map));
    }

    #[test]
    fn test_default_types_compressible() {
        let types = CompressibleTypes::default();
        for ct in [
            "text/html",
            "text/plain; charset=utf-8",
            "text/css",
            "application/json",
            "application/javascript",
            "application/xml",
            "application/xhtml+xml",
            "image/svg+xml",
        ] {
            assert!(types.matches(ct), "{ct} should be compressible");
        }
    }

    #[test]
    fn test_default_types_not_compressible() {
        let types = CompressibleTypes::default();
        for ct in [
            "image/png",
            "image/jpeg",
            "font/woff2",
            "video/mp4",
            "application/octet-stream",
            "application/wasm",
        ] {
            assert!(!types.matches(ct), "{ct} should not be compressible");
        }
    }

    #[test]
    fn test_matches_case_insensitive() {
        let types = CompressibleTypes::default();
        assert!(types.matches("Text/HTML"));
        assert!(types.matches("APPLICATION/JSON; charset=UTF-8"));

        let custom = CompressibleTypes::new(["Application/Wasm"]);
        assert!(custom.matches("application/wasm"));
        assert_eq!(custom.prefixes().collect::<Vec<_>>(), vec!["application/wasm"]);
    }

    #[test]
    fn test_is_compressible_without_content_type() {
        let types = CompressibleTypes::default();
        assert!(!types.is_compressible(&HeaderMap::new()));
        assert!(types.is_compressible(&headers([("content-type", "text/css")])));
    }

    #[test]
    fn test_vary_added() {
        let mut map = HeaderMap::new();
        add_vary_accept_encoding(&mut map);
        assert_eq!(map.get(header::VARY).unwrap(), "accept-encoding");
    }

    #[test]
    fn test_vary_appended() {
        let mut map = headers([("vary", "origin")]);
        add_vary_accept_encoding(&mut map);
        let values: Vec<_> = map
            .get_all(header::VARY)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["origin", "accept-encoding"]);
    }

    #[test]
    fn test_vary_not_duplicated() {
        let mut map = headers([("vary", "Origin, Accept-Encoding")]);
        add_vary_accept_encoding(&mut map);
        assert_eq!(map.get_all(header::VARY).iter().count(), 1);

        let mut star = headers([("vary", "*")]);
        add_vary_accept_encoding(&mut star);
        assert_eq!(star.get(header::VARY).unwrap(), "*");
        assert_eq!(star.get_all(header::VARY).iter().count(), 1);
    }
}
