use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ProvisionError, Result};
use crate::universe::Universe;

const PREFIX_DEV_LITERAL: &str = "dev-literal://";
const PREFIX_ENV: &str = "env://";
const PREFIX_STORE: &str = "store://";

/// A value that may live in a secret store. Only the location is ever
/// persisted; the value is resolved lazily through [`Secrets::resolve`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString {
    location: String,
}

impl SecretString {
    pub fn from_location(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// A secret kept inline, never written to a store.
    pub fn literal(value: &str) -> Self {
        Self::from_location(format!("{PREFIX_DEV_LITERAL}{value}"))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_empty()
    }

    fn store_path(&self) -> Option<(&str, &str)> {
        self.location
            .strip_prefix(PREFIX_STORE)
            .and_then(|path| path.split_once('/'))
    }
}

impl From<String> for SecretString {
    fn from(location: String) -> Self {
        Self { location }
    }
}

// Never print literal secrets.
impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.starts_with(PREFIX_STORE) || self.location.starts_with(PREFIX_ENV) {
            write!(f, "SecretString({})", self.location)
        } else if self.location.is_empty() {
            f.write_str("SecretString(<empty>)")
        } else {
            f.write_str("SecretString(********)")
        }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn find(&self, scope: &str, name: &str) -> Result<Option<String>>;
    async fn put(&self, scope: &str, name: &str, value: &str) -> Result<()>;
    async fn delete(&self, scope: &str, name: &str) -> Result<()>;
}

/// Process-local store for tests and local tooling.
#[derive(Default)]
pub struct MemorySecretStore {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn find(&self, scope: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .read()
            .await
            .get(&(scope.to_string(), name.to_string()))
            .cloned())
    }

    async fn put(&self, scope: &str, name: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert((scope.to_string(), name.to_string()), value.to_string());
        Ok(())
    }

    async fn delete(&self, scope: &str, name: &str) -> Result<()> {
        self.values
            .write()
            .await
            .remove(&(scope.to_string(), name.to_string()));
        Ok(())
    }
}

/// Resolves and mints [`SecretString`]s for one universe.
#[derive(Clone)]
pub struct Secrets {
    universe: Universe,
    store: Option<Arc<dyn SecretStore>>,
}

impl Secrets {
    /// Secrets without a backing store: only inline, env and empty
    /// locations can be resolved.
    pub fn new(universe: Universe) -> Self {
        Self {
            universe,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    fn store(&self) -> Result<&Arc<dyn SecretStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| ProvisionError::Secret("no secret store configured".into()))
    }

    pub async fn resolve(&self, secret: &SecretString) -> Result<String> {
        let location = secret.location();
        if location.is_empty() {
            // passwordless local databases
            return Ok(String::new());
        }
        if let Some(value) = location.strip_prefix(PREFIX_DEV_LITERAL) {
            return Ok(value.to_string());
        }
        if let Some(var) = location.strip_prefix(PREFIX_ENV) {
            return std::env::var(var)
                .map_err(|_| ProvisionError::Secret(format!("env var {var} is not set")));
        }
        if location.starts_with(PREFIX_STORE) {
            let (scope, name) = secret.store_path().ok_or_else(|| {
                ProvisionError::Secret(format!("malformed secret location {location}"))
            })?;
            return self.store()?.find(scope, name).await?.ok_or_else(|| {
                ProvisionError::Secret(format!("secret {scope}/{name} not found"))
            });
        }
        Ok(location.to_string())
    }

    /// Stores a new secret the way the current universe expects and returns
    /// a reference to it.
    pub async fn new_string(&self, scope: &str, name: &str, value: &str) -> Result<SecretString> {
        if self.universe.uses_literal_secrets() {
            return Ok(SecretString::literal(value));
        }
        self.store()?.put(scope, name, value).await?;
        Ok(store_location(scope, name))
    }

    /// Like [`Secrets::new_string`], but returns the secret already stored
    /// under `scope`/`name` when there is one. Inline universes have no
    /// store to consult and always mint.
    pub async fn existing_or_new_string(
        &self,
        scope: &str,
        name: &str,
        value: &str,
    ) -> Result<SecretString> {
        if !self.universe.uses_literal_secrets()
            && self.store()?.find(scope, name).await?.is_some()
        {
            return Ok(store_location(scope, name));
        }
        self.new_string(scope, name, value).await
    }

    /// Removes a stored secret; inline secrets have nothing to delete.
    pub async fn delete(&self, secret: &SecretString) -> Result<()> {
        match secret.store_path() {
            Some((scope, name)) => self.store()?.delete(scope, name).await,
            None => Ok(()),
        }
    }
}

fn store_location(scope: &str, name: &str) -> SecretString {
    SecretString::from_location(format!("{PREFIX_STORE}{scope}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_every_location_kind() {
        let secrets = Secrets::new(Universe::Dev);
        assert_eq!(secrets.resolve(&SecretString::empty()).await.unwrap(), "");
        assert_eq!(
            secrets.resolve(&SecretString::literal("hunter2")).await.unwrap(),
            "hunter2"
        );
        assert_eq!(
            secrets
                .resolve(&SecretString::from_location("plain"))
                .await
                .unwrap(),
            "plain"
        );
        let stored = SecretString::from_location("store://console/x");
        assert!(secrets.resolve(&stored).await.is_err());
    }

    #[tokio::test]
    async fn new_string_is_literal_in_dev() {
        let store = Arc::new(MemorySecretStore::new());
        let secrets = Secrets::new(Universe::Test).with_store(store.clone());
        let s = secrets.new_string("console", "db-dbpassword", "pw").await.unwrap();
        assert_eq!(s.location(), "dev-literal://pw");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn new_string_uses_store_in_prod() {
        let store = Arc::new(MemorySecretStore::new());
        let secrets = Secrets::new(Universe::Prod).with_store(store.clone());
        let s = secrets.new_string("console", "db-dbpassword", "pw").await.unwrap();
        assert_eq!(s.location(), "store://console/db-dbpassword");
        assert_eq!(secrets.resolve(&s).await.unwrap(), "pw");

        secrets.delete(&s).await.unwrap();
        assert!(secrets.resolve(&s).await.is_err());
    }

    #[tokio::test]
    async fn existing_secret_is_kept() {
        let store = Arc::new(MemorySecretStore::new());
        let secrets = Secrets::new(Universe::Prod).with_store(store.clone());
        let first = secrets
            .existing_or_new_string("console", "db-dbpassword", "pw1")
            .await
            .unwrap();
        let second = secrets
            .existing_or_new_string("console", "db-dbpassword", "pw2")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(secrets.resolve(&first).await.unwrap(), "pw1");
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn debug_hides_literals() {
        let s = SecretString::literal("hunter2");
        assert!(!format!("{s:?}").contains("hunter2"));
        let json = serde_json::to_string(&SecretString::from_location("env://PW")).unwrap();
        assert_eq!(json, "\"env://PW\"");
    }
}
