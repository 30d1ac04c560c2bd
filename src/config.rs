use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{DbConfig, POSTGRES_DRIVER};
use crate::secret::{SecretString, Secrets};
use crate::services::encryption::parse_master_key;
use crate::services::secrets::PgSecretStore;
use crate::universe::Universe;

/// Where the shared cache lives. Carried to every node; nothing in
/// provisioning talks to the cache itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub universe: Universe,
    pub companyconfig_db: DbConfig,
    pub bootstrap_db: DbConfig,
    pub logdb_bootstrap_db: DbConfig,
    pub secrets_master_key: Option<String>,
    pub settle_delay: Duration,
    pub use_baseline_schema: bool,
    /// Tenant whose database holds every company's login app.
    pub console_tenant_id: Option<Uuid>,
    pub cache: CacheConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bootstrap_db = db_config_from_env("BOOTSTRAP_DB")?;
        let logdb_bootstrap_db = if env::var("LOGDB_BOOTSTRAP_DB_HOST").is_ok() {
            db_config_from_env("LOGDB_BOOTSTRAP_DB")?
        } else {
            bootstrap_db.clone()
        };

        Ok(Self {
            universe: env::var("UNIVERSE")
                .unwrap_or_else(|_| "dev".into())
                .parse()
                .map_err(anyhow::Error::msg)?,
            companyconfig_db: db_config_from_env("COMPANYCONFIG_DB")?,
            bootstrap_db,
            logdb_bootstrap_db,
            secrets_master_key: env::var("SECRETS_MASTER_KEY").ok().filter(|s| !s.is_empty()),
            settle_delay: Duration::from_millis(
                env::var("PROVISION_SETTLE_DELAY_MS")
                    .unwrap_or_else(|_| "5000".into())
                    .parse()?,
            ),
            use_baseline_schema: env::var("USE_BASELINE_SCHEMA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            console_tenant_id: env::var("CONSOLE_TENANT_ID")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.parse())
                .transpose()
                .context("CONSOLE_TENANT_ID is not a UUID")?,
            cache: CacheConfig {
                url: env::var("CACHE_URL").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}

impl Config {
    /// Secrets for this universe, backed by the encrypted store in
    /// company-config when a master key is configured.
    pub fn secrets(&self, companyconfig: &PgPool) -> anyhow::Result<Secrets> {
        let secrets = Secrets::new(self.universe);
        Ok(match &self.secrets_master_key {
            Some(key) => secrets.with_store(Arc::new(PgSecretStore::new(
                companyconfig.clone(),
                parse_master_key(key)?,
            ))),
            None => secrets,
        })
    }
}

/// Reads `<PREFIX>_HOST`, `_PORT`, `_DRIVER`, `_PRODUCT`, `_NAME`, `_USER`
/// and `_PASSWORD`. The password is a secret location, not a value.
pub fn db_config_from_env(prefix: &str) -> anyhow::Result<DbConfig> {
    let var = |suffix: &str| format!("{prefix}_{suffix}");
    let cfg = DbConfig {
        host: required(&var("HOST"))?,
        port: env::var(var("PORT"))
            .unwrap_or_else(|_| "5432".into())
            .parse()
            .with_context(|| format!("{} is not a port", var("PORT")))?,
        driver: env::var(var("DRIVER")).unwrap_or_else(|_| POSTGRES_DRIVER.into()),
        product: env::var(var("PRODUCT")).unwrap_or_default().parse()?,
        db_name: required(&var("NAME"))?,
        user: required(&var("USER"))?,
        password: SecretString::from_location(env::var(var("PASSWORD")).unwrap_or_default()),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
