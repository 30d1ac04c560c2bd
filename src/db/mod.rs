pub mod companyconfig;
pub mod logdb;
pub mod statements;
pub mod tenantdb;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::error::{ProvisionError, Result};
use crate::naming;
use crate::secret::{SecretString, Secrets};

pub const POSTGRES_DRIVER: &str = "postgres";

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DbProduct {
    #[default]
    Postgres,
    AwsAuroraPostgres,
}

impl FromStr for DbProduct {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "postgres" => Ok(DbProduct::Postgres),
            "aws-aurora-postgres" => Ok(DbProduct::AwsAuroraPostgres),
            other => Err(ProvisionError::Config(format!("unknown DB product '{other}'"))),
        }
    }
}

fn default_driver() -> String {
    POSTGRES_DRIVER.to_string()
}

/// Where a database lives and how to log into it. `db_name` may carry a
/// cluster prefix (`cluster.dbname`) that is kept for connection routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub product: DbProduct,
    pub db_name: String,
    pub user: String,
    #[serde(default)]
    pub password: SecretString,
}

impl DbConfig {
    pub fn is_local(&self) -> bool {
        LOCAL_HOSTS.contains(&self.host.as_str())
    }

    pub fn bare_db_name(&self) -> &str {
        naming::bare_db_name(&self.db_name)
    }

    pub fn cluster_prefix(&self) -> &str {
        naming::cluster_prefix(&self.db_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ProvisionError::Config(format!(
                "database '{}' has no host",
                self.db_name
            )));
        }
        if self.port == 0 {
            return Err(ProvisionError::Config(format!(
                "database '{}' has no port",
                self.db_name
            )));
        }
        naming::validate_db_identifier(self.bare_db_name())?;
        naming::validate_user_identifier(&self.user)?;
        Ok(())
    }

    /// Moves this configuration onto the override's cluster: host, port,
    /// driver and product come from the override and the bare database name
    /// is re-prefixed with the override's cluster prefix.
    pub fn moved_to(&self, cluster: &DbConfig) -> DbConfig {
        DbConfig {
            host: cluster.host.clone(),
            port: cluster.port,
            driver: cluster.driver.clone(),
            product: cluster.product,
            db_name: naming::join_cluster_name(cluster.cluster_prefix(), self.bare_db_name()),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

/// An open connection pool plus the engine the server reported.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
    server_product: String,
    db_name: String,
}

impl Db {
    pub async fn connect(cfg: &DbConfig, secrets: &Secrets) -> Result<Self> {
        Self::connect_with_limits(cfg, secrets, 2).await
    }

    pub async fn connect_with_limits(
        cfg: &DbConfig,
        secrets: &Secrets,
        max_connections: u32,
    ) -> Result<Self> {
        if cfg.driver != POSTGRES_DRIVER {
            return Err(ProvisionError::UnexpectedDriver(cfg.driver.clone()));
        }

        let password = secrets.resolve(&cfg.password).await?;
        let mut options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .database(&cfg.db_name);
        if !password.is_empty() {
            options = options.password(&password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let version = match sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&pool)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                pool.close().await;
                return Err(e.into());
            }
        };
        let server_product = version
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            pool,
            server_product,
            db_name: cfg.db_name.clone(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn server_product(&self) -> &str {
        &self.server_product
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Rejects connections to anything other than a Postgres-compatible server.
pub fn validate_driver(db: &Db) -> Result<()> {
    if db.server_product() != "PostgreSQL" {
        return Err(ProvisionError::UnexpectedDriver(
            db.server_product().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(host: &str, db_name: &str) -> DbConfig {
        DbConfig {
            host: host.into(),
            port: 5432,
            driver: POSTGRES_DRIVER.into(),
            product: DbProduct::Postgres,
            db_name: db_name.into(),
            user: "tenant_abc".into(),
            password: SecretString::literal("pw"),
        }
    }

    #[test]
    fn moved_to_keeps_logical_name() {
        let provisioned = cfg("db.old", "old-cluster.tenantdb_abc");
        let mut cluster = cfg("db.new", "honey-badger-123.defaultdb");
        cluster.port = 26257;
        cluster.product = DbProduct::AwsAuroraPostgres;

        let moved = provisioned.moved_to(&cluster);
        assert_eq!(moved.host, "db.new");
        assert_eq!(moved.port, 26257);
        assert_eq!(moved.product, DbProduct::AwsAuroraPostgres);
        assert_eq!(moved.db_name, "honey-badger-123.tenantdb_abc");
        assert_eq!(moved.user, "tenant_abc");

        // moving again onto the same cluster is a no-op
        assert_eq!(moved.moved_to(&cluster), moved);
    }

    #[test]
    fn moved_to_bare_cluster_drops_prefix() {
        let provisioned = cfg("db.old", "old-cluster.tenantdb_abc");
        let moved = provisioned.moved_to(&cfg("db.new", "postgres"));
        assert_eq!(moved.db_name, "tenantdb_abc");
    }

    #[test]
    fn validate_and_locality() {
        assert!(cfg("localhost", "tenantdb_abc").is_local());
        assert!(!cfg("db.internal", "tenantdb_abc").is_local());
        assert!(cfg("db.internal", "cluster.tenantdb_abc").validate().is_ok());
        assert!(cfg("", "tenantdb_abc").validate().is_err());
        assert!(cfg("db", "bad name").validate().is_err());
    }

    #[test]
    fn config_json_shape() {
        let json = serde_json::json!({
            "host": "localhost",
            "port": 5432,
            "product": "aws-aurora-postgres",
            "db_name": "tenantdb_abc",
            "user": "tenant_abc",
            "password": "dev-literal://pw"
        });
        let parsed: DbConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.driver, POSTGRES_DRIVER);
        assert_eq!(parsed.product, DbProduct::AwsAuroraPostgres);
        assert_eq!(parsed.password, SecretString::literal("pw"));
    }
}
