use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::DbConfig;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSpec {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub url: String,
}

/// Where a tenant's databases live. Never exposed outside provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TenantInternal {
    pub tenant_id: Uuid,
    #[sqlx(json)]
    pub tenant_db: DbConfig,
    #[sqlx(json)]
    pub log_db: DbConfig,
}
