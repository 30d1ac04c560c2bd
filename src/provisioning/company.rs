use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::edge::EdgeProvisioner;
use super::organization::OrganizationProvisioner;
use super::{Composite, Named, Operation, Parallelizable, ProvisionInfo, Provisionable};
use crate::error::{ProvisionError, Result};
use crate::models::company::CompanySpec;
use crate::models::organization::LoginApp;
use crate::services::companyconfig::CompanyConfigService;
use crate::services::tenantdb::TenantDbService;

#[derive(Debug, Clone, Default)]
pub struct CompanyOptions {
    /// User made admin of the new company.
    pub owner: Option<Uuid>,
    /// Company whose login-app settings the new company starts from.
    pub reference_company_id: Option<Uuid>,
}

/// Saves the company row and, when a tenant database is in scope, copies
/// login-app settings from the reference company. Must run after the
/// company's organization exists.
pub struct CompanyRowProvisioner {
    named: Named,
    pi: ProvisionInfo,
    company: CompanySpec,
    reference_company_id: Option<Uuid>,
}

impl CompanyRowProvisioner {
    pub fn new(pi: ProvisionInfo, company: CompanySpec, reference_company_id: Option<Uuid>) -> Self {
        Self {
            named: Named::new(format!("company row {}", company.id)),
            pi,
            company,
            reference_company_id,
        }
    }

    async fn copy_login_app_settings(&self, reference_id: Uuid) -> Result<()> {
        let Some(pool) = self.pi.tenant_db.as_ref() else {
            return Ok(());
        };
        let target = single_login_app(
            self.company.id,
            TenantDbService::list_login_apps(pool, self.company.id).await?,
        )?;
        let source = single_login_app(
            reference_id,
            TenantDbService::list_login_apps(pool, reference_id).await?,
        )?;
        info!(
            "[{}] copying login app settings from company {reference_id}",
            self.name()
        );
        TenantDbService::update_login_app_settings(pool, target.id, &source.settings).await
    }
}

/// Every company owns exactly one login app.
fn single_login_app(company_id: Uuid, mut apps: Vec<LoginApp>) -> Result<LoginApp> {
    match apps.len() {
        1 => Ok(apps.remove(0)),
        count => Err(ProvisionError::LoginAppCount { company_id, count }),
    }
}

#[async_trait]
impl Provisionable for CompanyRowProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        Parallelizable::None.allows(op)
    }

    async fn provision(&self) -> Result<()> {
        let saved = CompanyConfigService::save_company(&self.pi.company_config, &self.company).await?;
        info!("[{}] saved company '{}'", self.name(), saved.name);

        match self.reference_company_id {
            Some(reference_id) if reference_id != self.company.id => {
                self.copy_login_app_settings(reference_id).await
            }
            _ => Ok(()),
        }
    }

    async fn validate(&self) -> Result<()> {
        CompanyConfigService::get_company(&self.pi.company_config, self.company.id).await?;
        Ok(())
    }

    /// Callers tear down the company's tenants first.
    async fn cleanup(&self) -> Result<()> {
        CompanyConfigService::delete_company(&self.pi.company_config, self.company.id).await
    }
}

/// Builds the tree that provisions a company: its organization and admin
/// edge side by side (when a tenant database is in scope), then the row.
pub fn new_company_provisioner(
    pi: ProvisionInfo,
    company: CompanySpec,
    options: CompanyOptions,
) -> Composite {
    let mut children: Vec<Arc<dyn Provisionable>> = Vec::new();
    if pi.tenant_db.is_some() {
        children.push(Arc::new(OrganizationProvisioner::new(
            pi.clone(),
            company.id,
            company.name.clone(),
        )));
        if let Some(owner) = options.owner {
            children.push(Arc::new(EdgeProvisioner::company_admin(
                pi.clone(),
                owner,
                company.id,
            )));
        }
    }
    let name = format!("company {}", company.id);
    children.push(Arc::new(CompanyRowProvisioner::new(
        pi,
        company,
        options.reference_company_id,
    )));
    Composite::restricted_parallel(name, children)
}
