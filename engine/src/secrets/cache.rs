use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An in-memory cache of resolved credentials.
///
/// Credentials are resolved once at startup (`preload`) so a missing key
/// fails the run before the first cycle instead of halfway through it.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl SecretCache {
    /// Creates a new SecretCache wrapping the provided SecretManager
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a cache pre-filled with fixed values.
    ///
    /// Lookups for keys not in `pairs` still fall through to the manager.
    pub fn with_values<'a>(
        manager: Arc<SecretManager>,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let cache = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), SecretString::new(v)))
            .collect();
        Self {
            manager,
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Retrieves a secret, checking the memory cache first.
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| EngineError::KeyringError("secret cache poisoned".to_string()))?;
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let secret = SecretString::new(self.manager.get_secret(key)?);

        {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| EngineError::KeyringError("secret cache poisoned".to_string()))?;
            cache.insert(key.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// Resolves a set of keys up front, failing on the first missing one.
    pub fn preload(&self, keys: &[&str]) -> Result<(), EngineError> {
        for key in keys {
            self.get_secret(key)?;
        }
        Ok(())
    }

    /// Replaces every cached secret value in `text`, then applies the
    /// pattern-based scrubber.
    pub fn scrub(&self, text: &str) -> String {
        let mut result = text.to_string();
        if let Ok(cache) = self.cache.read() {
            for secret in cache.values() {
                // Short values such as PINECONE_ENV would redact ordinary words.
                if secret.expose().len() >= 12 {
                    result = result.replace(secret.expose(), "[REDACTED]");
                }
            }
        }
        SecretManager::scrub(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SecretCache {
        SecretCache::with_values(
            Arc::new(SecretManager::new("insight-test")),
            [("PINECONE_API_KEY", "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0"), ("PINECONE_ENV", "gcp")],
        )
    }

    #[test]
    fn test_prefilled_values_are_returned() {
        let cache = cache();
        let secret = cache.get_secret("PINECONE_ENV").unwrap();
        assert_eq!(secret.expose(), "gcp");
        assert!(cache.preload(&["PINECONE_API_KEY", "PINECONE_ENV"]).is_ok());
    }

    #[test]
    fn test_scrub_replaces_cached_values() {
        let cache = cache();
        let text = "upsert failed with key 0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0 in gcp";
        assert_eq!(cache.scrub(text), "upsert failed with key [REDACTED] in gcp");
    }

    #[test]
    fn test_preload_reports_missing_key() {
        let cache = cache();
        let err = cache
            .preload(&["PINECONE_ENV", "INSIGHT_TEST_NEVER_SET_KEY"])
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingCredential(_)));
    }
}
