//! Round-robin credential pool for upstream provider API keys.
//!
//! Built on the same `DashMap`-per-key shape as the other ephemeral-state stores in
//! this crate, with an atomic round-robin cursor over each provider's secret list —
//! acquire ordering only needs to spread load, not serialize exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

struct CredentialEntry {
    secrets: Vec<String>,
    cursor: AtomicUsize,
    total_acquires: AtomicUsize,
}

/// Round-robin pool of credentials keyed by provider tag.
pub struct CredentialPool {
    entries: DashMap<String, CredentialEntry>,
}

impl CredentialPool {
    pub fn new(provider_secrets: HashMap<String, Vec<String>>) -> Self {
        let entries = DashMap::new();
        for (tag, secrets) in provider_secrets {
            if secrets.is_empty() {
                continue;
            }
            entries.insert(
                tag,
                CredentialEntry {
                    secrets,
                    cursor: AtomicUsize::new(0),
                    total_acquires: AtomicUsize::new(0),
                },
            );
        }
        Self { entries }
    }

    /// Returns the next credential for `provider_tag` in round-robin order, or `None`
    /// if no secrets are configured for that provider.
    pub fn acquire(&self, provider_tag: &str) -> Option<String> {
        let entry = self.entries.get(provider_tag)?;
        let index = entry.cursor.fetch_add(1, Ordering::Relaxed) % entry.secrets.len();
        entry.total_acquires.fetch_add(1, Ordering::Relaxed);
        Some(entry.secrets[index].clone())
    }

    pub fn total_acquires(&self, provider_tag: &str) -> usize {
        self.entries
            .get(provider_tag)
            .map(|entry| entry.total_acquires.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(tag: &str, secrets: &[&str]) -> CredentialPool {
        let mut map = HashMap::new();
        map.insert(
            tag.to_string(),
            secrets.iter().map(|s| s.to_string()).collect(),
        );
        CredentialPool::new(map)
    }

    #[test]
    fn round_robins_over_secrets() {
        let pool = pool_with("images", &["a", "b", "c"]);
        let acquired: Vec<_> = (0..6).map(|_| pool.acquire("images").unwrap()).collect();
        assert_eq!(acquired, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn unknown_provider_returns_none() {
        let pool = pool_with("images", &["a"]);
        assert!(pool.acquire("unknown").is_none());
    }

    #[test]
    fn tracks_total_acquires() {
        let pool = pool_with("llm", &["a", "b"]);
        pool.acquire("llm");
        pool.acquire("llm");
        pool.acquire("llm");
        assert_eq!(pool.total_acquires("llm"), 3);
    }

    #[test]
    fn empty_secret_list_is_skipped() {
        let pool = pool_with("empty", &[]);
        assert!(pool.acquire("empty").is_none());
    }
}
