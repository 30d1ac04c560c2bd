#[macro_use]
mod common;

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use tenant_provisioner::models::company::CompanySpec;
use tenant_provisioner::models::tenant::TenantSpec;
use tenant_provisioner::provisioning::company::{new_company_provisioner, CompanyOptions};
use tenant_provisioner::provisioning::tenant::{TenantOptions, TenantProvisioner};
use tenant_provisioner::provisioning::{ProvisionInfo, Provisionable};
use tenant_provisioner::services::companyconfig::CompanyConfigService;
use tenant_provisioner::services::tenantdb::TenantDbService;
use tenant_provisioner::ProvisionError;

#[tokio::test]
async fn reprovisioning_company_keeps_identity() {
    let bootstrap = require_db!();
    let (cc, pool) = common::companyconfig_db(&bootstrap).await;
    let id = Uuid::new_v4();

    let pi = ProvisionInfo::new(pool.clone());
    new_company_provisioner(pi.clone(), CompanySpec::new(id, "acme"), CompanyOptions::default())
        .provision()
        .await
        .unwrap();
    new_company_provisioner(pi.clone(), CompanySpec::new(id, "acme-2"), CompanyOptions::default())
        .provision()
        .await
        .unwrap();

    let matching: Vec<_> = CompanyConfigService::list_companies(&pool)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.id == id)
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].name, "acme-2");

    let tree = new_company_provisioner(pi, CompanySpec::new(id, "acme-2"), CompanyOptions::default());
    tree.validate().await.unwrap();
    tree.cleanup().await.unwrap();
    let err = tree.validate().await.unwrap_err();
    assert!(matches!(err.root_cause(), ProvisionError::NotFound { .. }));

    cc.close().await.unwrap();
    cc.nuke().await.unwrap();
}

#[tokio::test]
async fn company_copies_reference_login_app() {
    let bootstrap = require_db!();
    let (cc, pool) = common::companyconfig_db(&bootstrap).await;
    let tenant_db = common::new_db(&bootstrap, "tenantdb").await;
    tenant_db.provision().await.unwrap();
    let tenant_pool = tenant_db.db().await.unwrap().pool().clone();
    let pi = ProvisionInfo::new(pool.clone()).with_tenant_db(Uuid::new_v4(), tenant_pool.clone());

    let reference = Uuid::new_v4();
    new_company_provisioner(
        pi.clone(),
        CompanySpec::new(reference, "console"),
        CompanyOptions::default(),
    )
    .provision()
    .await
    .unwrap();
    let apps = TenantDbService::list_login_apps(&tenant_pool, reference).await.unwrap();
    TenantDbService::update_login_app_settings(&tenant_pool, apps[0].id, &json!({"theme": "dark"}))
        .await
        .unwrap();

    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let tree = new_company_provisioner(
        pi,
        CompanySpec::new(id, "acme"),
        CompanyOptions {
            owner: Some(owner),
            reference_company_id: Some(reference),
        },
    );
    tree.provision().await.unwrap();
    tree.provision().await.unwrap();
    tree.validate().await.unwrap();

    let apps = TenantDbService::list_login_apps(&tenant_pool, id).await.unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].settings, json!({"theme": "dark"}));

    tenant_db.close().await.unwrap();
    tenant_db.nuke().await.unwrap();
    cc.close().await.unwrap();
    cc.nuke().await.unwrap();
}

#[tokio::test]
async fn tenant_lifecycle() {
    let bootstrap = require_db!();
    let (cc, pool) = common::companyconfig_db(&bootstrap).await;
    let company_id = Uuid::new_v4();
    new_company_provisioner(
        ProvisionInfo::new(pool.clone()),
        CompanySpec::new(company_id, "acme"),
        CompanyOptions::default(),
    )
    .provision()
    .await
    .unwrap();

    let mut options = TenantOptions::new(bootstrap.clone());
    options.settle_delay = Duration::ZERO;
    let tenant_id = Uuid::new_v4();
    let tenant = TenantProvisioner::new(
        pool.clone(),
        TenantSpec {
            id: tenant_id,
            company_id,
            name: "prod".into(),
            url: "https://acme-prod.tenant.localhost".into(),
        },
        options,
        common::secrets(),
    );

    assert!(tenant.validate().await.is_err());
    tenant.provision().await.unwrap();
    tenant.validate().await.unwrap();
    let recorded = CompanyConfigService::get_tenant_internal(&pool, tenant_id)
        .await
        .unwrap()
        .unwrap();

    // a second run reuses the recorded databases and keys
    tenant.provision().await.unwrap();
    tenant.validate().await.unwrap();
    let again = CompanyConfigService::get_tenant_internal(&pool, tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.tenant_db, recorded.tenant_db);
    assert_eq!(again.log_db, recorded.log_db);

    tenant.nuke().await.unwrap();
    let err = tenant.validate().await.unwrap_err();
    assert!(matches!(err.root_cause(), ProvisionError::NotFound { .. }));

    cc.close().await.unwrap();
    cc.nuke().await.unwrap();
}
