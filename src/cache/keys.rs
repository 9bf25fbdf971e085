//! Cache Key Builder
//!
//! Builds canonical `{namespace}:{name=value}:...` keys. Parameters are
//! sorted by name, absent values become the `all` sentinel, and reserved
//! characters are percent-encoded so two different filter sets can never
//! produce the same text. Overlong keys are replaced by a SHA-256 digest
//! behind the namespace prefix so pattern eviction still reaches them.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Write as _};

use sha2::{Digest, Sha256};

use crate::cache::policy::Namespace;
use crate::cache::MAX_KEY_LENGTH;

/// Encoding of an absent filter parameter.
pub const ALL_SENTINEL: &str = "all";

// == Cache Key ==
/// A namespaced cache key. Only constructible through [`CacheKeyBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    text: String,
}

impl CacheKey {
    /// Starts a key under `namespace` with no parameters.
    pub fn builder(namespace: Namespace) -> CacheKeyBuilder {
        CacheKeyBuilder {
            namespace,
            params: BTreeMap::new(),
        }
    }

    /// Key addressing a single entity's detail view.
    pub fn detail(namespace: Namespace, id: i64) -> CacheKey {
        Self::builder(namespace).param("id", Some(id)).build()
    }

    /// Glob matching every key under `namespace`.
    pub fn namespace_pattern(namespace: Namespace) -> String {
        format!("{}:*", namespace.as_str())
    }

    /// Namespace the key was built under.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The key as sent to the backend.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True when the canonical text was replaced by its digest.
    pub fn is_hashed(&self) -> bool {
        self.text[self.namespace.as_str().len() + 1..].starts_with('#')
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

// == Builder ==
/// Collects filter parameters in any order.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: Namespace,
    params: BTreeMap<String, Option<String>>,
}

impl CacheKeyBuilder {
    /// Adds a filter parameter. `None` means "no filter". Setting the same
    /// name twice keeps the last value.
    pub fn param<V: Display>(mut self, name: &str, value: Option<V>) -> Self {
        self.params
            .insert(name.to_string(), value.map(|v| v.to_string()));
        self
    }

    pub fn build(self) -> CacheKey {
        let ns = self.namespace.as_str();
        let mut text = String::with_capacity(ns.len() + 16 * self.params.len().max(1));
        text.push_str(ns);

        if self.params.is_empty() {
            text.push(':');
            text.push_str(ALL_SENTINEL);
        }

        // BTreeMap iterates in name order
        for (name, value) in &self.params {
            text.push(':');
            encode_into(&mut text, name);
            text.push('=');
            match value {
                None => text.push_str(ALL_SENTINEL),
                Some(v) if v == ALL_SENTINEL => {
                    // literal "all" must not read as the sentinel
                    text.push_str("%61");
                    text.push_str(&v[1..]);
                }
                Some(v) => encode_into(&mut text, v),
            }
        }

        if text.len() > MAX_KEY_LENGTH {
            let digest = Sha256::digest(text.as_bytes());
            text = format!("{ns}:#{}", hex::encode(digest));
        }

        CacheKey {
            namespace: self.namespace,
            text,
        }
    }
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | ':' | '=' | '*' | '?' | '[' | ']' | '#' | '\\')
        || c.is_whitespace()
        || c.is_control()
}

fn encode_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                // writing to a String cannot fail
                let _ = write!(out, "%{byte:02X}");
            }
        } else {
            out.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_order_does_not_matter() {
        let a = CacheKey::builder(Namespace::AcademicsNotes)
            .param("subject", Some(12))
            .param("category", Some("notes"))
            .param("page", Some(2))
            .build();
        let b = CacheKey::builder(Namespace::AcademicsNotes)
            .param("page", Some(2))
            .param("subject", Some(12))
            .param("category", Some("notes"))
            .build();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "academics.notes:category=notes:page=2:subject=12");
    }

    #[test]
    fn test_none_uses_sentinel() {
        let key = CacheKey::builder(Namespace::GalleryAlbums)
            .param::<&str>("type", None)
            .build();
        assert_eq!(key.as_str(), "gallery.albums:type=all");
    }

    #[test]
    fn test_none_empty_and_literal_all_are_distinct() {
        let none = CacheKey::builder(Namespace::GalleryAlbums)
            .param::<&str>("type", None)
            .build();
        let empty = CacheKey::builder(Namespace::GalleryAlbums)
            .param("type", Some(""))
            .build();
        let literal = CacheKey::builder(Namespace::GalleryAlbums)
            .param("type", Some("all"))
            .build();
        assert_ne!(none, empty);
        assert_ne!(none, literal);
        assert_ne!(empty, literal);
        assert_eq!(literal.as_str(), "gallery.albums:type=%61ll");
    }

    #[test]
    fn test_no_params_key() {
        let key = CacheKey::builder(Namespace::EventsStats).build();
        assert_eq!(key.as_str(), "events.stats:all");
    }

    #[test]
    fn test_separators_in_values_cannot_collide() {
        // a=1:b=2 as one value vs. two params
        let smuggled = CacheKey::builder(Namespace::EventsList)
            .param("a", Some("1:b=2"))
            .build();
        let honest = CacheKey::builder(Namespace::EventsList)
            .param("a", Some(1))
            .param("b", Some(2))
            .build();
        assert_ne!(smuggled, honest);
        assert_eq!(smuggled.as_str(), "events.list:a=1%3Ab%3D2");
    }

    #[test]
    fn test_glob_characters_are_escaped() {
        let key = CacheKey::builder(Namespace::ProjectsList)
            .param("q", Some("robot*"))
            .build();
        assert!(!key.as_str().contains('*'));
    }

    #[test]
    fn test_repeated_param_keeps_last() {
        let key = CacheKey::builder(Namespace::EventsList)
            .param("page", Some(1))
            .param("page", Some(3))
            .build();
        assert_eq!(key.as_str(), "events.list:page=3");
    }

    #[test]
    fn test_detail_key() {
        let key = CacheKey::detail(Namespace::AcademicsResource, 42);
        assert_eq!(key.as_str(), "academics.resource:id=42");
        assert_eq!(key.namespace(), Namespace::AcademicsResource);
        assert!(!key.is_hashed());
    }

    #[test]
    fn test_long_keys_are_hashed_with_prefix() {
        let long = "x".repeat(MAX_KEY_LENGTH);
        let key = CacheKey::builder(Namespace::CareersOpportunities)
            .param("search", Some(&long))
            .build();
        assert!(key.is_hashed());
        assert!(key.as_str().starts_with("careers.opportunities:#"));
        assert!(key.as_str().len() <= MAX_KEY_LENGTH);

        let other = CacheKey::builder(Namespace::CareersOpportunities)
            .param("search", Some(format!("{long}y")))
            .build();
        assert_ne!(key, other);
    }

    #[test]
    fn test_namespace_pattern() {
        assert_eq!(
            CacheKey::namespace_pattern(Namespace::GalleryAlbums),
            "gallery.albums:*"
        );
    }
}
