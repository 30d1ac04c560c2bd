use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{ProvisionError, Result};
use crate::secret::SecretStore;
use crate::services::encryption;

/// Secret store backed by the company-config `secrets` table. Values are
/// encrypted with a per-scope key derived from the master key.
pub struct PgSecretStore {
    pool: PgPool,
    master_key: [u8; 32],
}

impl PgSecretStore {
    pub fn new(pool: PgPool, master_key: [u8; 32]) -> Self {
        Self { pool, master_key }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn find(&self, scope: &str, name: &str) -> Result<Option<String>> {
        let row: Option<(Vec<u8>, Vec<u8>, Vec<u8>)> = sqlx::query_as(
            "SELECT ciphertext, iv, tag FROM secrets WHERE scope = $1 AND name = $2",
        )
        .bind(scope)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some((ciphertext, iv, tag)) = row else {
            return Ok(None);
        };
        let key = encryption::derive_scope_key(&self.master_key, scope)?;
        let plaintext = encryption::decrypt(&ciphertext, &iv, &tag, &key)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| ProvisionError::Secret(format!("secret {scope}/{name} is not UTF-8")))
    }

    async fn put(&self, scope: &str, name: &str, value: &str) -> Result<()> {
        let key = encryption::derive_scope_key(&self.master_key, scope)?;
        let (ciphertext, iv, tag) = encryption::encrypt(value.as_bytes(), &key)?;
        sqlx::query(
            "INSERT INTO secrets (scope, name, ciphertext, iv, tag)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (scope, name) DO UPDATE
             SET ciphertext = EXCLUDED.ciphertext,
                 iv = EXCLUDED.iv,
                 tag = EXCLUDED.tag,
                 updated_at = NOW()",
        )
        .bind(scope)
        .bind(name)
        .bind(ciphertext)
        .bind(iv)
        .bind(tag)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, scope: &str, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM secrets WHERE scope = $1 AND name = $2")
            .bind(scope)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
