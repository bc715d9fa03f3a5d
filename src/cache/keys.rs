// Persisted key naming.
// Derives cache keys from resource identifiers and builds store key names.

/// Prefix shared by every key the cache writes.
pub const KEY_PREFIX: &str = "remote_svg_";

/// Suffix marking a store-time key.
pub const TIMESTAMP_SUFFIX: &str = "_timestamp";

/// Last-sweep time for the whole cache.
pub const GLOBAL_TIMESTAMP_KEY: &str = "remote_svg_global_timestamp";

/// Reduce a resource identifier to its cache key: the final path segment.
///
/// Query strings and fragments are dropped first, so `a/icon.svg?v=2` and
/// `b/icon.svg` both map to `icon.svg`. Distinct identifiers with the same
/// file name share one cache entry.
///
/// Returns `None` when the identifier has no usable final segment, or when
/// the segment would produce a store key another key already owns: `global`
/// maps onto `GLOBAL_TIMESTAMP_KEY`, and a name ending in `_timestamp` maps
/// onto some other entry's timestamp key. Such identifiers are fetched
/// without caching.
pub fn cache_key(identifier: &str) -> Option<&str> {
    let path = identifier
        .split(['?', '#'])
        .next()
        .unwrap_or(identifier)
        .trim();

    match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() && !is_reserved_segment(segment) => Some(segment),
        _ => None,
    }
}

fn is_reserved_segment(segment: &str) -> bool {
    segment == "global" || segment.ends_with(TIMESTAMP_SUFFIX)
}

/// Store key holding cached content.
pub fn content_key(cache_key: &str) -> String {
    format!("{}{}", KEY_PREFIX, cache_key)
}

/// Store key holding the epoch-millisecond store time for `cache_key`.
pub fn timestamp_key(cache_key: &str) -> String {
    format!("{}{}{}", KEY_PREFIX, cache_key, TIMESTAMP_SUFFIX)
}

/// Whether a store key holds cache content or a cache timestamp.
///
/// The global sweep timestamp is excluded; it is bookkeeping, not cache data.
pub fn is_cache_key(key: &str) -> bool {
    key != GLOBAL_TIMESTAMP_KEY && key.len() > KEY_PREFIX.len() && key.starts_with(KEY_PREFIX)
}

/// Whether a store key is a per-entry timestamp key.
pub fn is_timestamp_key(key: &str) -> bool {
    is_cache_key(key) && key.ends_with(TIMESTAMP_SUFFIX)
}

/// Recover the cache key from a content key, if `key` is one.
pub fn cache_key_of_content(key: &str) -> Option<&str> {
    if is_cache_key(key) && !is_timestamp_key(key) {
        key.strip_prefix(KEY_PREFIX)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_final_segment() {
        assert_eq!(cache_key("https://cdn.example/test.svg"), Some("test.svg"));
        assert_eq!(
            cache_key("https://cdn.example/icons/light/hover/arrow.svg"),
            Some("arrow.svg")
        );
        assert_eq!(cache_key("arrow.svg"), Some("arrow.svg"));
    }

    #[test]
    fn test_cache_key_drops_query_and_fragment() {
        assert_eq!(cache_key("https://cdn.example/a.svg?v=2"), Some("a.svg"));
        assert_eq!(cache_key("https://cdn.example/a.svg#frag"), Some("a.svg"));
    }

    #[test]
    fn test_cache_key_collides_on_file_name() {
        assert_eq!(
            cache_key("https://one.example/x/icon.svg"),
            cache_key("https://two.example/y/icon.svg")
        );
    }

    #[test]
    fn test_cache_key_underivable() {
        assert_eq!(cache_key(""), None);
        assert_eq!(cache_key("   "), None);
        assert_eq!(cache_key("https://cdn.example/icons/"), None);
    }

    #[test]
    fn test_cache_key_rejects_reserved_names() {
        assert_eq!(cache_key("https://cdn.example/icons/global"), None);
        assert_eq!(cache_key("https://cdn.example/global_timestamp"), None);
        assert_eq!(cache_key("https://cdn.example/a.svg_timestamp"), None);
        assert_eq!(cache_key("https://cdn.example/global.svg"), Some("global.svg"));

        // No derivable key may ever land on the sweep bookkeeping key.
        for name in ["global", "global_timestamp", "global.svg"] {
            if let Some(key) = cache_key(name) {
                assert_ne!(content_key(key), GLOBAL_TIMESTAMP_KEY);
                assert_ne!(timestamp_key(key), GLOBAL_TIMESTAMP_KEY);
            }
        }
    }

    #[test]
    fn test_key_names() {
        assert_eq!(content_key("test.svg"), "remote_svg_test.svg");
        assert_eq!(timestamp_key("test.svg"), "remote_svg_test.svg_timestamp");
    }

    #[test]
    fn test_cache_key_matching() {
        assert!(is_cache_key("remote_svg_test.svg"));
        assert!(is_cache_key("remote_svg_test.svg_timestamp"));
        assert!(is_timestamp_key("remote_svg_test.svg_timestamp"));
        assert!(!is_timestamp_key("remote_svg_test.svg"));

        assert!(!is_cache_key(GLOBAL_TIMESTAMP_KEY));
        assert!(!is_cache_key("remote_svg_"));
        assert!(!is_cache_key("theme"));
        assert!(!is_cache_key("other_timestamp"));
    }

    #[test]
    fn test_cache_key_of_content() {
        assert_eq!(cache_key_of_content("remote_svg_test.svg"), Some("test.svg"));
        assert_eq!(cache_key_of_content("remote_svg_test.svg_timestamp"), None);
        assert_eq!(cache_key_of_content("theme"), None);
    }
}
