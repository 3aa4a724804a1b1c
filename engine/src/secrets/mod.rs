pub mod cache;
pub mod string;

pub use cache::SecretCache;
pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::sync::OnceLock;

/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Environment variable holding the Pinecone API key
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";

/// Environment variable holding the Pinecone environment (e.g. `us-east1-gcp`)
pub const PINECONE_ENV: &str = "PINECONE_ENV";

/// Environment variable holding the contact email NCBI requires for Entrez
pub const EMAIL: &str = "EMAIL";

/// SecretManager resolves credentials for the external services.
///
/// Lookup order for a key such as `OPENAI_API_KEY`:
/// 1. The environment variable of the same name
/// 2. The OS keychain entry `<service>/<key in lowercase>`
///
/// There is no interactive prompt: the agent loop runs unattended, so a
/// missing credential is a fatal configuration error.
///
/// The SecretManager also provides secret scrubbing functionality to remove
/// sensitive data from console output and error messages.
pub struct SecretManager {
    service_name: String,
}

/// Regex patterns for detecting common secret formats.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Initializes and returns the secret detection patterns.
///
/// Patterns match:
/// - OpenAI API keys: sk-[a-zA-Z0-9-_]{20,}
/// - Pinecone API keys: pcsk_[a-zA-Z0-9_]{20,}
/// - Bearer tokens: Bearer\s+[^\s]{20,}
/// - Api-Key headers: Api-Key:\s*[^\s]+
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"sk-[a-zA-Z0-9\-_]{20,}").expect("Invalid OpenAI pattern"),
            Regex::new(r"pcsk_[a-zA-Z0-9_]{20,}").expect("Invalid Pinecone pattern"),
            Regex::new(r"Bearer\s+[^\s]{20,}").expect("Invalid Bearer pattern"),
            Regex::new(r"(?i)api-key:\s*[^\s]+").expect("Invalid Api-Key pattern"),
        ]
    })
}

impl SecretManager {
    /// Creates a new SecretManager with the given service name.
    ///
    /// The service name is used to namespace secrets in the OS keychain.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Retrieves a credential from the environment, then the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::MissingCredential` naming the key if neither
    /// source has a non-empty value.
    pub fn get_secret(&self, key: &str) -> Result<String, EngineError> {
        if let Ok(value) = std::env::var(key) {
            let value = value.trim().to_string();
            if !value.is_empty() {
                tracing::debug!("Resolved '{}' from environment", key);
                return Ok(value);
            }
        }

        let entry = self.keychain_entry(key).map_err(|e| {
            EngineError::MissingCredential(format!("{} ({})", key, e))
        })?;

        match entry.get_password() {
            Ok(secret) if !secret.trim().is_empty() => {
                tracing::debug!("Resolved '{}' from keychain", key);
                Ok(secret.trim().to_string())
            }
            Ok(_) | Err(keyring::Error::NoEntry) => Err(EngineError::MissingCredential(
                key.to_string(),
            )),
            Err(e) => {
                tracing::debug!("Keychain lookup for '{}' failed: {}", key, e);
                Err(EngineError::MissingCredential(format!(
                    "{} (keychain unavailable: {})",
                    key, e
                )))
            }
        }
    }

    /// Stores a secret in the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.keychain_entry(key)?.set_password(value).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Deletes a secret from the OS keychain.
    pub fn delete_secret(&self, key: &str) -> Result<(), EngineError> {
        self.keychain_entry(key)?.delete_password().map_err(|e| {
            EngineError::KeyringError(format!("Failed to delete secret '{}': {}", key, e))
        })?;

        tracing::info!("Deleted secret '{}' from keychain", key);
        Ok(())
    }

    /// Checks whether a credential is resolvable without returning it.
    pub fn has_secret(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }

    fn keychain_entry(&self, key: &str) -> Result<Entry, EngineError> {
        Entry::new(&self.service_name, &key.to_ascii_lowercase()).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use insight_engine::secrets::SecretManager;
    ///
    /// let scrubbed = SecretManager::scrub("My API key is sk-1234567890abcdefghij");
    /// assert_eq!(scrubbed, "My API key is [REDACTED]");
    /// ```
    pub fn scrub(text: &str) -> String {
        let patterns = get_secret_patterns();
        let mut result = text.to_string();

        for pattern in patterns {
            result = pattern.replace_all(&result, "[REDACTED]").to_string();
        }

        result
    }
}
