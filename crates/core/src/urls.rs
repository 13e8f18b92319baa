//! URL key normalization for cache lookups and origin checks.
//!
//! Fragments never reach the server, so two URLs differing only in their
//! fragment must map to the same cache slot. The normalized string form is
//! also the key type of the persisted alias cache.

use url::Url;

/// Return a copy of `url` with the fragment removed.
pub fn strip_fragment(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    stripped
}

/// The fragment-stripped string form of `url`, used as a cache key.
pub fn normalized_key(url: &Url) -> String {
    strip_fragment(url).into()
}

/// Whether two URLs share an origin (scheme, host, port).
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fragment() {
        let url = Url::parse("https://se.com/search?q=weather#results").unwrap();
        let stripped = strip_fragment(&url);
        assert_eq!(stripped.fragment(), None);
        assert_eq!(stripped.query(), Some("q=weather"));
    }

    #[test]
    fn test_normalized_key_equates_fragment_variants() {
        let a = Url::parse("https://se.com/search?q=weather").unwrap();
        let b = Url::parse("https://se.com/search?q=weather#top").unwrap();
        assert_eq!(normalized_key(&a), normalized_key(&b));
    }

    #[test]
    fn test_normalized_key_preserves_query() {
        let url = Url::parse("https://se.com/search?q=weather&pf=cs").unwrap();
        assert_eq!(normalized_key(&url), "https://se.com/search?q=weather&pf=cs");
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://se.com/search?q=a").unwrap();
        let b = Url::parse("https://se.com/other/path").unwrap();
        assert!(same_origin(&a, &b));
    }

    #[test]
    fn test_different_origin() {
        let a = Url::parse("https://se.com/search").unwrap();
        let b = Url::parse("https://evil.com/search").unwrap();
        let c = Url::parse("http://se.com/search").unwrap();
        assert!(!same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
    }
}
