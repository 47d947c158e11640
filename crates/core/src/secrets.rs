//! Storage for credentials that must not live in the plain key-value store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{Error, Result};

/// Secret key holding the backend refresh token.
pub const SESSION_REFRESH_TOKEN_KEY: &str = "catchlog.session.refresh_token";
/// Secret key holding the current backend access token.
pub const SESSION_ACCESS_TOKEN_KEY: &str = "catchlog.session.access_token";

/// Platform keychain / keystore port.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, key: &str) -> Result<Option<String>>;
    fn set_secret(&self, key: &str, value: &str) -> Result<()>;
    fn delete_secret(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        let secrets = self
            .secrets
            .read()
            .map_err(|_| Error::storage("secret store lock poisoned"))?;
        Ok(secrets.get(key).cloned())
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| Error::storage("secret store lock poisoned"))?;
        secrets.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| Error::storage("secret store lock poisoned"))?;
        secrets.remove(key);
        Ok(())
    }
}
