//! Profile links
//!
//! A [`Link`] associates one external profile id with one local user id.
//! In the [`LinkStore`](crate::traits::LinkStore) it is stored as
//! `profile:<profile-id>` → `<local-user-id>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key prefix for link entries in the link store
pub const LINK_KEY_PREFIX: &str = "profile:";

/// Association between an external profile and a local user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    /// External profile id
    pub profile_id: String,
    /// Local chat-server user id
    pub local_user_id: String,
}

impl Link {
    /// Create a new link
    pub fn new(profile_id: impl Into<String>, local_user_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            local_user_id: local_user_id.into(),
        }
    }

    /// Store key for this link
    pub fn key(&self) -> String {
        key_for(&self.profile_id)
    }
}

/// Store key for a profile id
pub fn key_for(profile_id: &str) -> String {
    format!("{LINK_KEY_PREFIX}{profile_id}")
}

/// Parse a store entry into a link
///
/// Returns `None` for keys without the link prefix or with an empty id.
pub fn parse_entry(key: &str, value: &str) -> Option<Link> {
    let profile_id = key.strip_prefix(LINK_KEY_PREFIX)?;
    if profile_id.is_empty() || value.is_empty() {
        return None;
    }
    Some(Link::new(profile_id, value))
}

/// Turn a store snapshot into links, sorted by profile id
pub fn links_from_entries(entries: &HashMap<String, String>) -> Vec<Link> {
    let mut links: Vec<Link> = entries
        .iter()
        .filter_map(|(key, value)| parse_entry(key, value))
        .collect();
    links.sort();
    links
}

/// Find the link held by a local user, if any
pub fn find_by_local_user(
    entries: &HashMap<String, String>,
    local_user_id: &str,
) -> Option<Link> {
    links_from_entries(entries)
        .into_iter()
        .find(|link| link.local_user_id == local_user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn key_uses_profile_prefix() {
        assert_eq!(Link::new("abc", "u1").key(), "profile:abc");
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        let store = entries(&[
            ("profile:abc", "u1"),
            ("settings:volume", "11"),
            ("profile:", "u2"),
            ("profile:def", ""),
        ]);

        let links = links_from_entries(&store);
        assert_eq!(links, vec![Link::new("abc", "u1")]);
    }

    #[test]
    fn find_by_local_user_matches_value() {
        let store = entries(&[("profile:abc", "u1"), ("profile:def", "u2")]);

        assert_eq!(
            find_by_local_user(&store, "u2"),
            Some(Link::new("def", "u2"))
        );
        assert_eq!(find_by_local_user(&store, "u3"), None);
    }
}
