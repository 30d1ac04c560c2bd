//! End-to-end provisioning of one tenant: its rows in company-config, its
//! tenant and log databases, its signing keys and its default organization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use super::db::{DbProvisioner, DEFAULT_SETTLE_DELAY};
use super::keys::generate_signing_keys;
use super::organization::OrganizationProvisioner;
use super::{Composite, Named, Operation, Parallelizable, ProvisionInfo, Provisionable};
use crate::config::{CacheConfig, Config};
use crate::db::{logdb, tenantdb, Db, DbConfig};
use crate::error::{ProvisionError, Result};
use crate::models::tenant::{TenantInternal, TenantSpec};
use crate::naming;
use crate::secret::Secrets;
use crate::services::companyconfig::CompanyConfigService;
use crate::services::tenantdb::TenantDbService;
use crate::universe::Universe;

pub use crate::naming::generate_tenant_url;

/// Where a tenant's databases are created and how.
#[derive(Debug, Clone)]
pub struct TenantOptions {
    pub bootstrap: DbConfig,
    pub log_bootstrap: DbConfig,
    /// Moves the tenant database onto another cluster.
    pub override_bootstrap: Option<DbConfig>,
    pub settle_delay: Duration,
    pub use_baseline_schema: bool,
    pub cache: CacheConfig,
}

impl TenantOptions {
    pub fn new(bootstrap: DbConfig) -> Self {
        Self {
            log_bootstrap: bootstrap.clone(),
            bootstrap,
            override_bootstrap: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
            use_baseline_schema: false,
            cache: CacheConfig::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bootstrap: config.bootstrap_db.clone(),
            log_bootstrap: config.logdb_bootstrap_db.clone(),
            override_bootstrap: None,
            settle_delay: config.settle_delay,
            use_baseline_schema: config.use_baseline_schema,
            cache: config.cache.clone(),
        }
    }

    pub fn with_override(mut self, cluster: Option<DbConfig>) -> Self {
        self.override_bootstrap = cluster;
        self
    }
}

pub struct TenantProvisioner {
    named: Named,
    company_config: PgPool,
    tenant: TenantSpec,
    options: TenantOptions,
    secrets: Secrets,
    universe: Universe,
}

/// The two database provisioners of a tenant, kept concrete so the caller
/// can reach their owner connections after provisioning.
struct TenantDatabases {
    tenant_db: Arc<DbProvisioner>,
    log_db: Arc<DbProvisioner>,
}

impl TenantDatabases {
    fn composite(&self) -> Composite {
        Composite::restricted_parallel(
            "databases",
            vec![
                Arc::clone(&self.tenant_db) as Arc<dyn Provisionable>,
                Arc::clone(&self.log_db) as Arc<dyn Provisionable>,
            ],
        )
    }

    async fn close(&self) {
        if let Err(e) = self.composite().close().await {
            warn!("closing tenant databases: {e}");
        }
    }
}

impl TenantProvisioner {
    pub fn new(
        company_config: PgPool,
        tenant: TenantSpec,
        options: TenantOptions,
        secrets: Secrets,
    ) -> Self {
        Self {
            named: Named::new(format!("tenant {}", tenant.id)),
            company_config,
            universe: secrets.universe(),
            tenant,
            options,
            secrets,
        }
    }

    /// Provisioners for databases created earlier (as recorded in
    /// `tenants_internal`) or for brand new ones.
    async fn databases(&self, existing: Option<TenantInternal>) -> Result<TenantDatabases> {
        let id = self.tenant.id;
        let (tenant_db, log_db) = match existing {
            Some(internal) => (
                DbProvisioner::from_configs(
                    "tenantdb",
                    self.options.bootstrap.clone(),
                    internal.tenant_db,
                    tenantdb::SCHEMA,
                    self.secrets.clone(),
                    self.options.override_bootstrap.as_ref(),
                ),
                DbProvisioner::from_configs(
                    "logdb",
                    self.options.log_bootstrap.clone(),
                    internal.log_db,
                    logdb::SCHEMA,
                    self.secrets.clone(),
                    None,
                ),
            ),
            None => (
                DbProvisioner::new_database(
                    "tenantdb",
                    self.options
                        .override_bootstrap
                        .clone()
                        .unwrap_or_else(|| self.options.bootstrap.clone()),
                    &naming::tenant_db_name(id),
                    &naming::tenant_db_user(id),
                    tenantdb::SCHEMA,
                    self.secrets.clone(),
                )
                .await?,
                DbProvisioner::new_database(
                    "logdb",
                    self.options.log_bootstrap.clone(),
                    &naming::log_db_name(id),
                    &naming::log_db_user(id),
                    logdb::SCHEMA,
                    self.secrets.clone(),
                )
                .await?,
            ),
        };

        let mut tenant_db = tenant_db.with_settle_delay(self.options.settle_delay);
        if self.options.use_baseline_schema {
            tenant_db = tenant_db.with_baseline(tenantdb::baseline_schema());
        }
        let log_db = log_db.with_settle_delay(self.options.settle_delay);
        Ok(TenantDatabases {
            tenant_db: Arc::new(tenant_db),
            log_db: Arc::new(log_db),
        })
    }

    async fn recorded_databases(&self) -> Result<TenantInternal> {
        CompanyConfigService::get_tenant_internal(&self.company_config, self.tenant.id)
            .await?
            .ok_or_else(|| ProvisionError::not_found("tenant databases", self.tenant.id))
    }

    async fn provision_contents(&self, dbs: &TenantDatabases, company_name: &str) -> Result<()> {
        // Recorded first so a retry after a partial failure reuses these
        // configs, passwords included, instead of minting new ones.
        CompanyConfigService::save_tenant_internal(
            &self.company_config,
            &TenantInternal {
                tenant_id: self.tenant.id,
                tenant_db: dbs.tenant_db.provisioned_config().clone(),
                log_db: dbs.log_db.provisioned_config().clone(),
            },
        )
        .await?;

        Operation::Provision
            .execute(&dbs.composite())
            .await
            .map_err(|e| e.in_node("databases", Operation::Provision))?;

        let (Some(tenant_db), Some(log_db)) = (dbs.tenant_db.db().await, dbs.log_db.db().await)
        else {
            return Err(ProvisionError::Config(
                "database provisioner kept no connection".into(),
            ));
        };

        let pi = self.provision_info(tenant_db.pool().clone(), Some(log_db.pool().clone()));
        self.ensure_signing_keys(tenant_db.pool()).await?;

        let org = OrganizationProvisioner::new(pi, self.tenant.company_id, company_name);
        Operation::Provision
            .execute(&org)
            .await
            .map_err(|e| e.in_node(org.name(), Operation::Provision))
    }

    fn provision_info(&self, tenant_db: PgPool, log_db: Option<PgPool>) -> ProvisionInfo {
        let pi = ProvisionInfo::new(self.company_config.clone())
            .with_tenant_db(self.tenant.id, tenant_db)
            .with_cache(self.options.cache.clone());
        match log_db {
            Some(pool) => pi.with_log_db(pool),
            None => pi,
        }
    }

    async fn ensure_signing_keys(&self, pool: &PgPool) -> Result<()> {
        if !TenantDbService::list_signing_keys(pool, self.tenant.id)
            .await?
            .is_empty()
        {
            return Ok(());
        }
        let bundle = generate_signing_keys(&self.secrets, self.tenant.id).await?;
        TenantDbService::save_signing_key(pool, self.tenant.id, &bundle).await
    }

    async fn validate_contents(&self, internal: &TenantInternal) -> Result<()> {
        let db = Db::connect(&internal.tenant_db, &self.secrets).await?;
        let result = async {
            if TenantDbService::list_signing_keys(db.pool(), self.tenant.id)
                .await?
                .is_empty()
            {
                return Err(ProvisionError::not_found("signing key", self.tenant.id));
            }
            let org = OrganizationProvisioner::new(
                self.provision_info(db.pool().clone(), None),
                self.tenant.company_id,
                "",
            );
            Operation::Validate
                .execute(&org)
                .await
                .map_err(|e| e.in_node(org.name(), Operation::Validate))
        }
        .await;
        db.close().await;
        result
    }

    /// Drops both databases and forgets the tenant. Refused outside dev
    /// universes.
    pub async fn nuke(&self) -> Result<()> {
        if !self.universe.is_dev() {
            return Err(ProvisionError::UniverseGate(self.universe));
        }
        info!("[{}] nuking", self.name());

        if let Some(internal) =
            CompanyConfigService::get_tenant_internal(&self.company_config, self.tenant.id).await?
        {
            self.forget_signing_keys(&internal.tenant_db).await;
            let dbs = self.databases(Some(internal)).await?;
            dbs.tenant_db.nuke().await?;
            dbs.log_db.nuke().await?;
        }
        CompanyConfigService::delete_tenant(&self.company_config, self.tenant.id).await
    }

    /// Deletes stored private keys. The keys' table goes with the database.
    async fn forget_signing_keys(&self, tenant_db: &DbConfig) {
        let db = match Db::connect(tenant_db, &self.secrets).await {
            Ok(db) => db,
            Err(e) => {
                warn!("[{}] tenant database unavailable: {e}", self.name());
                return;
            }
        };
        match TenantDbService::list_signing_keys(db.pool(), self.tenant.id).await {
            Ok(keys) => {
                for key in keys {
                    if let Err(e) = self.secrets.delete(&key.private_key).await {
                        warn!("[{}] deleting signing key {}: {e}", self.name(), key.key_id);
                    }
                }
            }
            Err(e) => warn!("[{}] listing signing keys: {e}", self.name()),
        }
        db.close().await;
    }
}

#[async_trait]
impl Provisionable for TenantProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        Parallelizable::All.allows(op)
    }

    async fn provision(&self) -> Result<()> {
        let company =
            CompanyConfigService::get_company(&self.company_config, self.tenant.company_id).await?;
        CompanyConfigService::save_tenant(&self.company_config, &self.tenant).await?;
        info!("[{}] saved tenant '{}'", self.name(), self.tenant.name);

        let existing =
            CompanyConfigService::get_tenant_internal(&self.company_config, self.tenant.id).await?;
        let dbs = self.databases(existing).await?;
        let result = self.provision_contents(&dbs, &company.name).await;
        dbs.close().await;
        result
    }

    async fn validate(&self) -> Result<()> {
        CompanyConfigService::get_tenant(&self.company_config, self.tenant.id).await?;
        CompanyConfigService::get_company(&self.company_config, self.tenant.company_id).await?;

        let internal = self.recorded_databases().await?;
        let dbs = self.databases(Some(internal.clone())).await?;
        Operation::Validate
            .execute(&dbs.composite())
            .await
            .map_err(|e| e.in_node("databases", Operation::Validate))?;

        self.validate_contents(&internal).await
    }

    /// Forgets the tenant. Its databases are left in place.
    async fn cleanup(&self) -> Result<()> {
        if let Some(internal) =
            CompanyConfigService::get_tenant_internal(&self.company_config, self.tenant.id).await?
        {
            let dbs = self.databases(Some(internal)).await?;
            Operation::Cleanup.execute(&dbs.composite()).await?;
        }
        CompanyConfigService::delete_tenant(&self.company_config, self.tenant.id).await
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::db::{DbProduct, POSTGRES_DRIVER};
    use crate::secret::SecretString;

    fn options() -> TenantOptions {
        TenantOptions::new(DbConfig {
            host: "unreachable.invalid".into(),
            port: 5432,
            driver: POSTGRES_DRIVER.into(),
            product: DbProduct::Postgres,
            db_name: "postgres".into(),
            user: "root".into(),
            password: SecretString::empty(),
        })
    }

    fn spec() -> TenantSpec {
        TenantSpec {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "prod".into(),
            url: String::new(),
        }
    }

    #[tokio::test]
    async fn nuke_is_refused_outside_dev() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unreachable.invalid/companyconfig")
            .unwrap();
        let p = TenantProvisioner::new(pool, spec(), options(), Secrets::new(Universe::OnPrem));
        let err = p.nuke().await.unwrap_err();
        assert!(matches!(err, ProvisionError::UniverseGate(Universe::OnPrem)));
    }

    #[tokio::test]
    async fn new_databases_follow_naming_rules() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unreachable.invalid/companyconfig")
            .unwrap();
        let tenant = spec();
        let id = tenant.id;
        let p = TenantProvisioner::new(pool, tenant, options(), Secrets::new(Universe::Dev));
        let dbs = p.databases(None).await.unwrap();

        assert_eq!(dbs.tenant_db.provisioned_config().db_name, naming::tenant_db_name(id));
        assert_eq!(dbs.tenant_db.provisioned_config().user, naming::tenant_db_user(id));
        assert_eq!(dbs.log_db.provisioned_config().db_name, naming::log_db_name(id));
        assert_eq!(dbs.log_db.provisioned_config().user, naming::log_db_user(id));
    }
}
