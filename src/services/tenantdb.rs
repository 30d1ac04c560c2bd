use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::edge::Edge;
use crate::models::keys::{KeyBundle, SigningKey};
use crate::models::organization::{LoginApp, Organization};

/// Reads and writes the objects stored in a tenant database.
pub struct TenantDbService;

impl TenantDbService {
    pub async fn save_organization(
        pool: &PgPool,
        id: Uuid,
        company_id: Uuid,
        name: &str,
    ) -> Result<Organization> {
        let org = sqlx::query_as::<_, Organization>(
            "INSERT INTO organizations (id, company_id, name)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name,
                 updated_at = NOW()
             RETURNING *",
        )
        .bind(id)
        .bind(company_id)
        .bind(name)
        .fetch_one(pool)
        .await?;
        Ok(org)
    }

    pub async fn find_organization(pool: &PgPool, id: Uuid) -> Result<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(org)
    }

    pub async fn delete_organization(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn list_login_apps(pool: &PgPool, company_id: Uuid) -> Result<Vec<LoginApp>> {
        let apps = sqlx::query_as::<_, LoginApp>(
            "SELECT * FROM login_apps WHERE company_id = $1 ORDER BY created_at",
        )
        .bind(company_id)
        .fetch_all(pool)
        .await?;
        Ok(apps)
    }

    pub async fn create_login_app(
        pool: &PgPool,
        company_id: Uuid,
        name: &str,
        settings: &serde_json::Value,
    ) -> Result<LoginApp> {
        let app = sqlx::query_as::<_, LoginApp>(
            "INSERT INTO login_apps (company_id, name, settings)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(company_id)
        .bind(name)
        .bind(settings)
        .fetch_one(pool)
        .await?;
        Ok(app)
    }

    pub async fn update_login_app_settings(
        pool: &PgPool,
        id: Uuid,
        settings: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query("UPDATE login_apps SET settings = $1, updated_at = NOW() WHERE id = $2")
            .bind(settings)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete_login_apps(pool: &PgPool, company_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM login_apps WHERE company_id = $1")
            .bind(company_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn save_edge(pool: &PgPool, edge: &Edge) -> Result<()> {
        sqlx::query(
            "INSERT INTO authz_edges (src_type, src_id, relation, dst_type, dst_id)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (src_type, src_id, relation, dst_type, dst_id) DO NOTHING",
        )
        .bind(&edge.src_type)
        .bind(edge.src_id)
        .bind(&edge.relation)
        .bind(&edge.dst_type)
        .bind(edge.dst_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn edge_exists(pool: &PgPool, edge: &Edge) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM authz_edges
                WHERE src_type = $1 AND src_id = $2 AND relation = $3
                  AND dst_type = $4 AND dst_id = $5
             )",
        )
        .bind(&edge.src_type)
        .bind(edge.src_id)
        .bind(&edge.relation)
        .bind(&edge.dst_type)
        .bind(edge.dst_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn delete_edge(pool: &PgPool, edge: &Edge) -> Result<()> {
        sqlx::query(
            "DELETE FROM authz_edges
             WHERE src_type = $1 AND src_id = $2 AND relation = $3
               AND dst_type = $4 AND dst_id = $5",
        )
        .bind(&edge.src_type)
        .bind(edge.src_id)
        .bind(&edge.relation)
        .bind(&edge.dst_type)
        .bind(edge.dst_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn save_signing_key(pool: &PgPool, tenant_id: Uuid, key: &KeyBundle) -> Result<()> {
        sqlx::query(
            "INSERT INTO signing_keys (key_id, tenant_id, public_key, private_key)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (key_id) DO NOTHING",
        )
        .bind(&key.key_id)
        .bind(tenant_id)
        .bind(&key.public_key)
        .bind(key.private_key.location())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_signing_keys(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<SigningKey>> {
        let keys = sqlx::query_as::<_, SigningKey>(
            "SELECT * FROM signing_keys WHERE tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;
        Ok(keys)
    }
}
