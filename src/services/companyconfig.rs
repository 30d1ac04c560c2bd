use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ProvisionError, Result};
use crate::models::company::{Company, CompanySpec};
use crate::models::tenant::{Tenant, TenantInternal, TenantSpec};

/// Reads and writes the company-config database.
pub struct CompanyConfigService;

impl CompanyConfigService {
    /// Inserts the company, or updates its name and type in place.
    pub async fn save_company(pool: &PgPool, spec: &CompanySpec) -> Result<Company> {
        let company = sqlx::query_as::<_, Company>(
            "INSERT INTO companies (id, name, company_type)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name,
                 company_type = EXCLUDED.company_type,
                 updated_at = NOW()
             RETURNING *",
        )
        .bind(spec.id)
        .bind(&spec.name)
        .bind(spec.company_type.as_str())
        .fetch_one(pool)
        .await?;
        Ok(company)
    }

    pub async fn find_company(pool: &PgPool, id: Uuid) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(company)
    }

    pub async fn get_company(pool: &PgPool, id: Uuid) -> Result<Company> {
        Self::find_company(pool, id)
            .await?
            .ok_or_else(|| ProvisionError::not_found("company", id))
    }

    pub async fn list_companies(pool: &PgPool) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY name")
            .fetch_all(pool)
            .await?;
        Ok(companies)
    }

    pub async fn delete_company(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn save_tenant(pool: &PgPool, spec: &TenantSpec) -> Result<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, company_id, name, url)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name,
                 url = EXCLUDED.url,
                 updated_at = NOW()
             RETURNING *",
        )
        .bind(spec.id)
        .bind(spec.company_id)
        .bind(&spec.name)
        .bind(&spec.url)
        .fetch_one(pool)
        .await?;
        Ok(tenant)
    }

    pub async fn find_tenant(pool: &PgPool, id: Uuid) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(tenant)
    }

    pub async fn get_tenant(pool: &PgPool, id: Uuid) -> Result<Tenant> {
        Self::find_tenant(pool, id)
            .await?
            .ok_or_else(|| ProvisionError::not_found("tenant", id))
    }

    pub async fn list_tenants(pool: &PgPool, company_id: Uuid) -> Result<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE company_id = $1 ORDER BY name",
        )
        .bind(company_id)
        .fetch_all(pool)
        .await?;
        Ok(tenants)
    }

    /// Deletes the tenant; its `tenants_internal` row goes with it.
    pub async fn delete_tenant(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn get_tenant_internal(pool: &PgPool, tenant_id: Uuid) -> Result<Option<TenantInternal>> {
        let internal = sqlx::query_as::<_, TenantInternal>(
            "SELECT tenant_id, tenant_db, log_db FROM tenants_internal WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;
        Ok(internal)
    }

    pub async fn save_tenant_internal(pool: &PgPool, internal: &TenantInternal) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenants_internal (tenant_id, tenant_db, log_db)
             VALUES ($1, $2, $3)
             ON CONFLICT (tenant_id) DO UPDATE
             SET tenant_db = EXCLUDED.tenant_db,
                 log_db = EXCLUDED.log_db,
                 updated_at = NOW()",
        )
        .bind(internal.tenant_id)
        .bind(sqlx::types::Json(&internal.tenant_db))
        .bind(sqlx::types::Json(&internal.log_db))
        .execute(pool)
        .await?;
        Ok(())
    }
}
