/// Drop a tenant's databases and delete its rows.
/// Only allowed in dev universes (UNIVERSE=dev|test|ci|container).
///
/// Usage: nuke-tenant --tenant-id UUID
use clap::Parser;

use tenant_provisioner::config::Config;
use tenant_provisioner::db::Db;
use tenant_provisioner::models::tenant::TenantSpec;
use tenant_provisioner::provisioning::tenant::{TenantOptions, TenantProvisioner};
use tenant_provisioner::secret::Secrets;
use tenant_provisioner::services::companyconfig::CompanyConfigService;

#[derive(Parser)]
#[command(name = "nuke-tenant", about = "Irreversibly delete a tenant and its databases")]
struct Args {
    #[arg(long)]
    tenant_id: uuid::Uuid,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    if !config.universe.is_dev() {
        anyhow::bail!("refusing to nuke tenants in universe {}", config.universe);
    }

    let companyconfig_db =
        Db::connect(&config.companyconfig_db, &Secrets::new(config.universe)).await?;
    let pool = companyconfig_db.pool().clone();
    let secrets = config.secrets(&pool)?;

    let result = async {
        let tenant = CompanyConfigService::get_tenant(&pool, args.tenant_id).await?;
        tracing::info!("Nuking tenant {} ({})", tenant.name, tenant.id);

        let provisioner = TenantProvisioner::new(
            pool.clone(),
            TenantSpec {
                id: tenant.id,
                company_id: tenant.company_id,
                name: tenant.name,
                url: tenant.url,
            },
            TenantOptions::from_config(&config),
            secrets,
        );
        provisioner.nuke().await
    }
    .await;

    companyconfig_db.close().await;
    result?;
    tracing::info!("Tenant {} nuked", args.tenant_id);
    Ok(())
}
