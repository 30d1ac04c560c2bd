//! Composable, idempotent units of infrastructure work.
//!
//! Every node implements [`Provisionable`]. Leaves do one thing (create a
//! database, save a row); [`Composite`] nodes run their children either
//! strictly in order or with independent children fanned out concurrently.

pub mod batch;
pub mod company;
pub mod composite;
pub mod db;
pub mod edge;
pub mod keys;
pub mod organization;
pub mod tenant;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::{ProvisionError, Result};
use crate::services::metrics;

pub use batch::BatchProvisioner;
pub use composite::{Composite, Strategy};
pub use db::DbProvisioner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Provision,
    Validate,
    Cleanup,
    Close,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Provision => "Provision",
            Operation::Validate => "Validate",
            Operation::Cleanup => "Cleanup",
            Operation::Close => "Close",
        }
    }

    /// Runs this operation on `node` and records its outcome.
    pub async fn execute(self, node: &dyn Provisionable) -> Result<()> {
        let started = Instant::now();
        let result = match self {
            Operation::Provision => node.provision().await,
            Operation::Validate => node.validate().await,
            Operation::Cleanup => node.cleanup().await,
            Operation::Close => node.close().await,
        };
        metrics::record_operation(self.as_str(), result.is_ok(), started.elapsed());
        result
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of infrastructure work.
///
/// `provision` must converge: calling it N times leaves the same state as
/// calling it once. `validate` must not change anything.
#[async_trait]
pub trait Provisionable: Send + Sync {
    /// Display name, used only in logs and error context.
    fn name(&self) -> &str;

    /// Whether this node may run concurrently with its siblings for `op`.
    fn is_executable_in_parallel(&self, op: Operation) -> bool;

    async fn provision(&self) -> Result<()>;

    async fn validate(&self) -> Result<()>;

    async fn cleanup(&self) -> Result<()>;

    /// Releases connections this node opened itself. Most nodes open none.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Holds a node's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named(String);

impl Named {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Which operations a node may run concurrently with its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelizable {
    None,
    All,
    Only(&'static [Operation]),
}

impl Parallelizable {
    pub fn allows(self, op: Operation) -> bool {
        match self {
            Parallelizable::None => false,
            Parallelizable::All => true,
            Parallelizable::Only(ops) => ops.contains(&op),
        }
    }
}

/// Shared context handed to every node of one provisioning call. The
/// embedded pools belong to whoever built the context; nodes must never
/// close them.
#[derive(Clone)]
pub struct ProvisionInfo {
    pub company_config: PgPool,
    pub tenant_db: Option<PgPool>,
    pub log_db: Option<PgPool>,
    pub cache: CacheConfig,
    pub tenant_id: Option<Uuid>,
}

impl ProvisionInfo {
    pub fn new(company_config: PgPool) -> Self {
        Self {
            company_config,
            tenant_db: None,
            log_db: None,
            cache: CacheConfig::default(),
            tenant_id: None,
        }
    }

    pub fn with_tenant_db(mut self, tenant_id: Uuid, pool: PgPool) -> Self {
        self.tenant_id = Some(tenant_id);
        self.tenant_db = Some(pool);
        self
    }

    pub fn with_log_db(mut self, pool: PgPool) -> Self {
        self.log_db = Some(pool);
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// The tenant database in scope, required by nodes that store objects in it.
    pub fn require_tenant_db(&self) -> Result<&PgPool> {
        self.tenant_db
            .as_ref()
            .ok_or_else(|| ProvisionError::Config("no tenant database in scope".into()))
    }
}
