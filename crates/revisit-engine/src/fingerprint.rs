//! Content-derived fingerprints for feed events
//!
//! A fingerprint identifies one logical event across re-renders: the same
//! actor, event type and leading snippet always hash to the same key.

use revisit_core::{FeedItem, Fingerprint};
use sha2::{Digest, Sha256};

use crate::text::{squash_whitespace, truncate_chars};

/// Hex characters kept from the digest
const FINGERPRINT_LEN: usize = 16;

/// Fingerprint of `item`, using the first `snippet_chars` of its snippet
pub fn fingerprint(item: &FeedItem, snippet_chars: usize) -> Fingerprint {
    let snippet = squash_whitespace(&item.content_snippet);

    let mut hasher = Sha256::new();
    hash_str(&mut hasher, item.actor.trim());
    hash_str(&mut hasher, item.event_type.as_str());
    hash_str(&mut hasher, truncate_chars(&snippet, snippet_chars));

    let digest = hex::encode(hasher.finalize());
    Fingerprint(digest[..FINGERPRINT_LEN].to_string())
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update(s.as_bytes());
    hasher.update([0]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_core::EventType;

    #[test]
    fn test_stable_across_rerender() {
        let a = FeedItem::new("alice", EventType::Comment, "great  post\nthanks", "3분 전");
        let b = FeedItem::new(" alice ", EventType::Comment, "great post thanks", "1시간 전");
        assert_eq!(fingerprint(&a, 40), fingerprint(&b, 40));
        assert_eq!(fingerprint(&a, 40).as_str().len(), 16);
    }

    #[test]
    fn test_event_type_and_actor_distinguish() {
        let like = FeedItem::new("alice", EventType::Like, "post", "");
        let comment = FeedItem::new("alice", EventType::Comment, "post", "");
        let other = FeedItem::new("bob", EventType::Like, "post", "");
        assert_ne!(fingerprint(&like, 40), fingerprint(&comment, 40));
        assert_ne!(fingerprint(&like, 40), fingerprint(&other, 40));
    }

    #[test]
    fn test_only_leading_snippet_counts() {
        let a = FeedItem::new("carol", EventType::Reply, "same start, tail one", "");
        let b = FeedItem::new("carol", EventType::Reply, "same start, tail two", "");
        assert_eq!(fingerprint(&a, 10), fingerprint(&b, 10));
        assert_ne!(fingerprint(&a, 40), fingerprint(&b, 40));
    }
}
