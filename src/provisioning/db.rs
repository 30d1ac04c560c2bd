//! Creates a database and its owning user from a privileged bootstrap
//! connection, then migrates it to the newest schema version.
//!
//! Every step checks before it acts, so `provision` can be re-run against a
//! database left half-built by an earlier failure.

use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Named, Operation, Parallelizable, Provisionable};
use crate::db::{statements, validate_driver, Db, DbConfig, DbProduct};
use crate::error::{ProvisionError, Result};
use crate::migrate::{self, Schema, NO_MIGRATIONS};
use crate::naming;
use crate::secret::{SecretString, Secrets};
use crate::services::metrics;
use crate::universe::Universe;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

const PASSWORD_BYTES: usize = 24;

pub struct DbProvisioner {
    named: Named,
    parallel: Parallelizable,
    bootstrap: DbConfig,
    provisioned: DbConfig,
    schema: Schema,
    baseline: Option<Schema>,
    secrets: Secrets,
    universe: Universe,
    settle_delay: Duration,
    owner_db: Mutex<Option<Db>>,
}

impl DbProvisioner {
    /// Prepares a brand new database `db_name` owned by `user` on the
    /// bootstrap's cluster. A password is minted and stored only when the
    /// bootstrap is remote and itself uses one; a password left in the store
    /// by an earlier attempt is reused, since the user may already exist.
    pub async fn new_database(
        name: impl Into<String>,
        bootstrap: DbConfig,
        db_name: &str,
        user: &str,
        schema: Schema,
        secrets: Secrets,
    ) -> Result<Self> {
        naming::validate_db_identifier(db_name)?;
        naming::validate_user_identifier(user)?;

        let password = if !bootstrap.is_local() && !bootstrap.password.is_empty() {
            secrets
                .existing_or_new_string(
                    naming::SERVICE_NAME_FOR_TENANT_DB_SECRET,
                    &naming::db_password_secret_name(db_name),
                    &random_password(),
                )
                .await?
        } else {
            SecretString::empty()
        };

        let provisioned = DbConfig {
            db_name: naming::join_cluster_name(bootstrap.cluster_prefix(), db_name),
            user: user.to_string(),
            password,
            ..bootstrap.clone()
        };
        Ok(Self::build(name.into(), bootstrap, provisioned, schema, secrets))
    }

    /// Wraps a database that was provisioned before. With `override_cfg`,
    /// both the bootstrap and the provisioned database move onto the
    /// override's cluster; the bare database name stays the same.
    pub fn from_configs(
        name: impl Into<String>,
        bootstrap: DbConfig,
        provisioned: DbConfig,
        schema: Schema,
        secrets: Secrets,
        override_cfg: Option<&DbConfig>,
    ) -> Self {
        let (bootstrap, provisioned) = match override_cfg {
            Some(cluster) => (cluster.clone(), provisioned.moved_to(cluster)),
            None => (bootstrap, provisioned),
        };
        Self::build(name.into(), bootstrap, provisioned, schema, secrets)
    }

    fn build(
        name: String,
        bootstrap: DbConfig,
        provisioned: DbConfig,
        schema: Schema,
        secrets: Secrets,
    ) -> Self {
        Self {
            named: Named::new(name),
            parallel: Parallelizable::All,
            universe: secrets.universe(),
            bootstrap,
            provisioned,
            schema,
            baseline: None,
            secrets,
            settle_delay: DEFAULT_SETTLE_DELAY,
            owner_db: Mutex::new(None),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Creates fresh databases from `baseline` instead of the current
    /// schema, leaving the remaining migrations to run incrementally.
    pub fn with_baseline(mut self, baseline: Schema) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn with_parallelizable(mut self, parallel: Parallelizable) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn bootstrap_config(&self) -> &DbConfig {
        &self.bootstrap
    }

    pub fn provisioned_config(&self) -> &DbConfig {
        &self.provisioned
    }

    /// The owner connection opened by the last successful `provision`.
    /// Closed by [`Provisionable::close`].
    pub async fn db(&self) -> Option<Db> {
        self.owner_db.lock().await.clone()
    }

    async fn connect_bootstrap(&self) -> Result<Db> {
        let db = Db::connect(&self.bootstrap, &self.secrets).await?;
        if let Err(e) = validate_driver(&db) {
            db.close().await;
            return Err(e);
        }
        Ok(db)
    }

    async fn retain(&self, db: Db) {
        if let Some(previous) = self.owner_db.lock().await.replace(db) {
            previous.close().await;
        }
    }

    async fn create_objects(&self, bootstrap: &Db) -> Result<()> {
        let user = &self.provisioned.user;
        let db_name = self.provisioned.bare_db_name();

        let users = count(bootstrap, statements::COUNT_USERS, user).await?;
        if users == 0 {
            info!("[{}] creating user {user}", self.name());
            let password = self.secrets.resolve(&self.provisioned.password).await?;
            exec(bootstrap, &statements::create_user(user, &password)).await?;
        } else {
            debug!("[{}] user {user} already exists", self.name());
        }
        metrics::record_step("create_user", users == 0);

        let databases = count(bootstrap, statements::COUNT_DATABASES, db_name).await?;
        if databases == 0 {
            info!("[{}] creating database {db_name}", self.name());
            exec(
                bootstrap,
                &statements::create_database(db_name, self.provisioned.product),
            )
            .await?;
        } else {
            debug!("[{}] database {db_name} already exists", self.name());
        }
        metrics::record_step("create_database", databases == 0);

        exec(bootstrap, &statements::grant_all_on_database(db_name, user)).await?;

        match self.provisioned.product {
            DbProduct::Postgres => self.grant_public_schema().await?,
            DbProduct::AwsAuroraPostgres => {
                let bootstrap_user = &self.bootstrap.user;
                exec(bootstrap, &statements::grant_role(user, bootstrap_user)).await?;
                exec(bootstrap, &statements::alter_database_owner(db_name, user)).await?;
                exec(bootstrap, &statements::revoke_role(user, bootstrap_user)).await?;
            }
        }
        Ok(())
    }

    /// Owning a database does not grant rights on its public schema, so the
    /// grant is issued from a bootstrap session inside the new database.
    async fn grant_public_schema(&self) -> Result<()> {
        let inside = DbConfig {
            db_name: self.provisioned.db_name.clone(),
            ..self.bootstrap.clone()
        };
        let db = Db::connect(&inside, &self.secrets).await?;
        let result = exec(&db, &statements::grant_public_schema(&self.provisioned.user)).await;
        db.close().await;
        result
    }

    async fn migrate(&self, owner: &Db) -> Result<()> {
        migrate::create_migrations_table(owner).await?;
        // every supported product is a Postgres variant
        migrate::enable_postgres_extensions(owner, self.schema.postgres_only_extensions).await?;

        let current = migrate::get_max_version(owner).await?;
        let fast_path = self.baseline.unwrap_or(self.schema);
        let bulk_create = current == NO_MIGRATIONS && fast_path.create_statements.is_some();
        if bulk_create {
            info!(
                "[{}] creating schema at version {}",
                self.name(),
                fast_path.migrations.max_available()
            );
            fast_path.apply(owner).await?;
        }
        metrics::record_step("create_schema", bulk_create);

        let current = migrate::get_max_version(owner).await?;
        let target = self.schema.migrations.max_available();
        if current < target {
            info!("[{}] migrating from {current} to {target}", self.name());
            self.schema.migrations.do_migration(owner, current, target).await?;
        } else if current > target {
            warn!(
                "[{}] database is at version {current}, newer than {target}",
                self.name()
            );
        }
        metrics::record_step("migrate", current < target);
        Ok(())
    }

    /// Drops the database and its user. Refused outside dev universes.
    pub async fn nuke(&self) -> Result<()> {
        if !self.universe.is_dev() {
            return Err(ProvisionError::UniverseGate(self.universe));
        }
        info!("[{}] nuking {}", self.name(), self.provisioned.db_name);

        let bootstrap = self.connect_bootstrap().await?;
        let result = self.grant_and_drop(&bootstrap).await;
        bootstrap.close().await;
        result?;

        if let Err(e) = self.secrets.delete(&self.provisioned.password).await {
            warn!("[{}] deleting password secret: {e}", self.name());
        }
        Ok(())
    }

    async fn grant_and_drop(&self, bootstrap: &Db) -> Result<()> {
        // Tables belong to the owner, so the bootstrap user needs rights on
        // them before it can drop the database. An owner that cannot connect
        // has nothing left to grant.
        match Db::connect(&self.provisioned, &self.secrets).await {
            Ok(owner) => {
                let result =
                    exec(&owner, &statements::grant_all_tables(&self.bootstrap.user)).await;
                owner.close().await;
                result?;
            }
            Err(e) => debug!("[{}] owner connection unavailable: {e}", self.name()),
        }
        self.close().await?;

        exec(
            bootstrap,
            &statements::drop_database(self.provisioned.bare_db_name()),
        )
        .await?;
        exec(bootstrap, &statements::drop_user(&self.provisioned.user)).await
    }
}

#[async_trait]
impl Provisionable for DbProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        self.parallel.allows(op)
    }

    async fn provision(&self) -> Result<()> {
        self.provisioned.validate()?;

        let bootstrap = self.connect_bootstrap().await?;
        let result = self.create_objects(&bootstrap).await;
        bootstrap.close().await;
        result?;

        debug!(
            "[{}] waiting {:?} for ownership changes to settle",
            self.name(),
            self.settle_delay
        );
        tokio::time::sleep(self.settle_delay).await;

        // not validated: the schema does not exist yet
        let owner = Db::connect(&self.provisioned, &self.secrets).await?;
        let result = self.migrate(&owner).await;
        self.retain(owner).await;
        result
    }

    async fn validate(&self) -> Result<()> {
        self.provisioned.validate()?;

        let bootstrap = self.connect_bootstrap().await?;
        let result = sqlx::query_scalar::<_, String>(statements::LIST_DATABASES)
            .fetch_all(bootstrap.pool())
            .await;
        bootstrap.close().await;

        let db_name = self.provisioned.bare_db_name();
        if result?.iter().any(|name| name == db_name) {
            Ok(())
        } else {
            Err(ProvisionError::DatabaseNotFound(
                self.provisioned.db_name.clone(),
            ))
        }
    }

    async fn cleanup(&self) -> Result<()> {
        // TODO: soft-delete (rename and revoke) once retention for orphaned
        // databases is decided; dropping is left to `nuke`.
        info!(
            "[{}] leaving database {} in place",
            self.name(),
            self.provisioned.db_name
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(db) = self.owner_db.lock().await.take() {
            db.close().await;
        }
        Ok(())
    }
}

async fn count(db: &Db, query: &str, name: &str) -> Result<i64> {
    let found = sqlx::query_scalar::<_, i64>(query)
        .bind(name)
        .fetch_optional(db.pool())
        .await?;
    Ok(found.unwrap_or(0))
}

async fn exec(db: &Db, sql: &str) -> Result<()> {
    sqlx::raw_sql(sql).execute(db.pool()).await?;
    Ok(())
}

fn random_password() -> String {
    let mut bytes = [0u8; PASSWORD_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{tenantdb, POSTGRES_DRIVER};
    use crate::secret::MemorySecretStore;

    fn bootstrap(host: &str, password: SecretString) -> DbConfig {
        DbConfig {
            host: host.into(),
            port: 5432,
            driver: POSTGRES_DRIVER.into(),
            product: DbProduct::Postgres,
            db_name: "honey-badger-123.postgres".into(),
            user: "root".into(),
            password,
        }
    }

    #[tokio::test]
    async fn local_bootstrap_gets_no_password() {
        let p = DbProvisioner::new_database(
            "tenantdb",
            bootstrap("localhost", SecretString::empty()),
            "tenantdb_abc",
            "tenant_abc",
            tenantdb::SCHEMA,
            Secrets::new(Universe::Dev),
        )
        .await
        .unwrap();

        let cfg = p.provisioned_config();
        assert_eq!(cfg.db_name, "honey-badger-123.tenantdb_abc");
        assert_eq!(cfg.bare_db_name(), "tenantdb_abc");
        assert_eq!(cfg.user, "tenant_abc");
        assert!(cfg.password.is_empty());
        assert_eq!(cfg.host, "localhost");
    }

    #[tokio::test]
    async fn remote_bootstrap_mints_stored_password() {
        let store = Arc::new(MemorySecretStore::new());
        let secrets = Secrets::new(Universe::Prod).with_store(store.clone());
        let p = DbProvisioner::new_database(
            "tenantdb",
            bootstrap("db.internal", SecretString::from_location("env://PGPASSWORD")),
            "tenantdb_abc",
            "tenant_abc",
            tenantdb::SCHEMA,
            secrets.clone(),
        )
        .await
        .unwrap();

        let password = &p.provisioned_config().password;
        assert_eq!(password.location(), "store://console/tenantdb_abc-dbpassword");
        let value = secrets.resolve(password).await.unwrap();
        assert_eq!(value.len(), 48);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn rerun_reuses_stored_password() {
        let store = Arc::new(MemorySecretStore::new());
        let secrets = Secrets::new(Universe::Prod).with_store(store.clone());
        let new_db = || {
            DbProvisioner::new_database(
                "tenantdb",
                bootstrap("db.internal", SecretString::from_location("env://PGPASSWORD")),
                "tenantdb_abc",
                "tenant_abc",
                tenantdb::SCHEMA,
                secrets.clone(),
            )
        };
        let first = new_db().await.unwrap();
        let first_password = secrets
            .resolve(&first.provisioned_config().password)
            .await
            .unwrap();
        let second = new_db().await.unwrap();

        assert_eq!(
            first.provisioned_config().password,
            second.provisioned_config().password
        );
        assert_eq!(
            secrets
                .resolve(&second.provisioned_config().password)
                .await
                .unwrap(),
            first_password
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn validate_rejects_bad_config_before_connecting() {
        let mut provisioned = bootstrap("db.internal", SecretString::empty());
        provisioned.host = String::new();
        let p = DbProvisioner::from_configs(
            "tenantdb",
            bootstrap("db.unreachable.invalid", SecretString::empty()),
            provisioned,
            tenantdb::SCHEMA,
            Secrets::new(Universe::Dev),
            None,
        );
        assert!(matches!(p.validate().await, Err(ProvisionError::Config(_))));
    }

    #[tokio::test]
    async fn rejects_unsafe_names() {
        let result = DbProvisioner::new_database(
            "tenantdb",
            bootstrap("localhost", SecretString::empty()),
            "x; DROP DATABASE y",
            "tenant_abc",
            tenantdb::SCHEMA,
            Secrets::new(Universe::Dev),
        )
        .await;
        assert!(matches!(result, Err(ProvisionError::InvalidIdentifier(_))));
    }

    #[test]
    fn override_moves_both_configs() {
        let provisioned = DbConfig {
            db_name: "honey-badger-123.tenantdb_abc".into(),
            user: "tenant_abc".into(),
            ..bootstrap("db.old", SecretString::literal("pw"))
        };
        let mut cluster = bootstrap("db.new", SecretString::literal("root"));
        cluster.db_name = "sleepy-otter-7.postgres".into();

        let p = DbProvisioner::from_configs(
            "tenantdb",
            bootstrap("db.old", SecretString::empty()),
            provisioned,
            tenantdb::SCHEMA,
            Secrets::new(Universe::Dev),
            Some(&cluster),
        );
        assert_eq!(p.bootstrap_config(), &cluster);
        assert_eq!(p.provisioned_config().host, "db.new");
        assert_eq!(
            p.provisioned_config().db_name,
            "sleepy-otter-7.tenantdb_abc"
        );

        // the same override again leaves it where it is
        let again = DbProvisioner::from_configs(
            "tenantdb",
            bootstrap("db.old", SecretString::empty()),
            p.provisioned_config().clone(),
            tenantdb::SCHEMA,
            Secrets::new(Universe::Dev),
            Some(&cluster),
        );
        assert_eq!(again.provisioned_config(), p.provisioned_config());
    }

    #[tokio::test]
    async fn nuke_is_refused_outside_dev() {
        // an unreachable host proves the gate fires before any connection
        let p = DbProvisioner::from_configs(
            "tenantdb",
            bootstrap("unreachable.invalid", SecretString::empty()),
            DbConfig {
                db_name: "tenantdb_abc".into(),
                user: "tenant_abc".into(),
                ..bootstrap("unreachable.invalid", SecretString::empty())
            },
            tenantdb::SCHEMA,
            Secrets::new(Universe::Prod),
            None,
        );
        let err = p.nuke().await.unwrap_err();
        assert!(matches!(err, ProvisionError::UniverseGate(Universe::Prod)));
        assert_eq!(
            err.to_string(),
            "cannot nuke resources except in Dev universe: prod"
        );
    }

    #[tokio::test]
    async fn cleanup_is_a_no_op() {
        let p = DbProvisioner::from_configs(
            "tenantdb",
            bootstrap("unreachable.invalid", SecretString::empty()),
            bootstrap("unreachable.invalid", SecretString::empty()),
            tenantdb::SCHEMA,
            Secrets::new(Universe::Prod),
            None,
        );
        p.cleanup().await.unwrap();
        p.close().await.unwrap();
        assert!(p.db().await.is_none());
    }
}
