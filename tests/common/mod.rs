//! Helpers for tests that need a live Postgres. Set PROVISION_TEST_DB_HOST
//! (and optionally _PORT, _USER, _PASSWORD, _NAME) to a superuser
//! connection; local hosts must trust passwordless logins.

#![allow(dead_code)]

use std::env;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use tenant_provisioner::db::{companyconfig, tenantdb, DbConfig, DbProduct, POSTGRES_DRIVER};
use tenant_provisioner::provisioning::{DbProvisioner, Provisionable};
use tenant_provisioner::secret::{SecretString, Secrets};
use tenant_provisioner::universe::Universe;

pub fn bootstrap() -> Option<DbConfig> {
    let host = env::var("PROVISION_TEST_DB_HOST").ok()?;
    let var = |suffix: &str, default: &str| {
        env::var(format!("PROVISION_TEST_DB_{suffix}")).unwrap_or_else(|_| default.to_string())
    };
    Some(DbConfig {
        host,
        port: var("PORT", "5432").parse().ok()?,
        driver: POSTGRES_DRIVER.into(),
        product: DbProduct::Postgres,
        db_name: var("NAME", "postgres"),
        user: var("USER", "postgres"),
        password: SecretString::from_location(var("PASSWORD", "")),
    })
}

macro_rules! require_db {
    () => {
        match common::bootstrap() {
            Some(cfg) => cfg,
            None => {
                eprintln!("PROVISION_TEST_DB_HOST not set, skipping");
                return;
            }
        }
    };
}

pub fn secrets() -> Secrets {
    Secrets::new(Universe::Test)
}

/// A database or user name no other test run will pick.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub async fn new_db(bootstrap: &DbConfig, prefix: &str) -> DbProvisioner {
    let name = unique(prefix);
    DbProvisioner::new_database(
        prefix,
        bootstrap.clone(),
        &name,
        &name,
        tenantdb::SCHEMA,
        secrets(),
    )
    .await
    .unwrap()
    .with_settle_delay(Duration::ZERO)
}

/// Provisions a throwaway company-config database and returns its
/// provisioner (still holding the owner connection) and pool.
pub async fn companyconfig_db(bootstrap: &DbConfig) -> (DbProvisioner, PgPool) {
    let name = unique("cc");
    let p = DbProvisioner::new_database(
        "companyconfig",
        bootstrap.clone(),
        &name,
        &name,
        companyconfig::SCHEMA,
        secrets(),
    )
    .await
    .unwrap()
    .with_settle_delay(Duration::ZERO);
    p.provision().await.unwrap();
    let pool = p.db().await.unwrap().pool().clone();
    (p, pool)
}
