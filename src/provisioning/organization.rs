use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{Named, Operation, Parallelizable, ProvisionInfo, Provisionable};
use crate::error::{ProvisionError, Result};
use crate::services::tenantdb::TenantDbService;

/// Ensures a company's organization and its single login app exist in the
/// tenant database. The organization shares the company's identifier.
pub struct OrganizationProvisioner {
    named: Named,
    pi: ProvisionInfo,
    company_id: Uuid,
    display_name: String,
}

impl OrganizationProvisioner {
    pub fn new(pi: ProvisionInfo, company_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            named: Named::new(format!("organization {company_id}")),
            pi,
            company_id,
            display_name: display_name.into(),
        }
    }
}

#[async_trait]
impl Provisionable for OrganizationProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        Parallelizable::All.allows(op)
    }

    async fn provision(&self) -> Result<()> {
        let pool = self.pi.require_tenant_db()?;
        TenantDbService::save_organization(pool, self.company_id, self.company_id, &self.display_name)
            .await?;

        let apps = TenantDbService::list_login_apps(pool, self.company_id).await?;
        if apps.is_empty() {
            info!("[{}] creating login app", self.name());
            TenantDbService::create_login_app(
                pool,
                self.company_id,
                &format!("{} login", self.display_name),
                &json!({}),
            )
            .await?;
        }
        Ok(())
    }

    async fn validate(&self) -> Result<()> {
        let pool = self.pi.require_tenant_db()?;
        TenantDbService::find_organization(pool, self.company_id)
            .await?
            .ok_or_else(|| ProvisionError::not_found("organization", self.company_id))?;

        let count = TenantDbService::list_login_apps(pool, self.company_id)
            .await?
            .len();
        if count != 1 {
            return Err(ProvisionError::LoginAppCount {
                company_id: self.company_id,
                count,
            });
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let pool = self.pi.require_tenant_db()?;
        TenantDbService::delete_login_apps(pool, self.company_id).await?;
        TenantDbService::delete_organization(pool, self.company_id).await
    }
}
