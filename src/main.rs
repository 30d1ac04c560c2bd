use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tenant_provisioner::config::{db_config_from_env, Config};
use tenant_provisioner::db::{companyconfig, Db};
use tenant_provisioner::models::company::{CompanySpec, CompanyType};
use tenant_provisioner::models::tenant::TenantSpec;
use tenant_provisioner::provisioning::company::{new_company_provisioner, CompanyOptions};
use tenant_provisioner::provisioning::tenant::{generate_tenant_url, TenantOptions, TenantProvisioner};
use tenant_provisioner::provisioning::{
    BatchProvisioner, DbProvisioner, Operation, ProvisionInfo, Provisionable,
};
use tenant_provisioner::secret::Secrets;
use tenant_provisioner::services::companyconfig::CompanyConfigService;
use tenant_provisioner::services::metrics;

#[derive(Parser)]
#[command(name = "provision", about = "Provision companies, tenants and their databases")]
struct Args {
    /// Print collected metrics when done
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    Provision,
    Validate,
    Cleanup,
}

impl From<Action> for Operation {
    fn from(action: Action) -> Self {
        match action {
            Action::Provision => Operation::Provision,
            Action::Validate => Operation::Validate,
            Action::Cleanup => Operation::Cleanup,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create or migrate the company-config database itself
    Companyconfig {
        #[arg(long, value_enum, default_value = "provision")]
        action: Action,
    },
    /// Provision a company row with its organization and admin edge
    Company {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "customer")]
        company_type: String,
        /// User made admin of the company
        #[arg(long)]
        owner: Option<Uuid>,
        #[arg(long, value_enum, default_value = "provision")]
        action: Action,
    },
    /// Provision a tenant and its databases
    Tenant {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        company_id: Uuid,
        #[arg(long)]
        name: String,
        /// Subdomain used to build the tenant URL
        #[arg(long, default_value = "tenant.localhost")]
        subdomain: String,
        /// Env var prefix of a bootstrap DB to move the tenant database onto
        #[arg(long)]
        override_prefix: Option<String>,
        #[arg(long, value_enum, default_value = "provision")]
        action: Action,
    },
    /// Validate every tenant of a company, a few at a time
    ValidateTenants {
        #[arg(long)]
        company_id: Uuid,
        #[arg(long, default_value_t = 4)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    info!("Provisioning in universe {}", config.universe);

    let result = run(args.command, &config).await;
    if args.print_metrics {
        println!("{}", metrics::render());
    }
    result
}

async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    if let Command::Companyconfig { action } = command {
        let provisioner = DbProvisioner::from_configs(
            "companyconfig",
            config.bootstrap_db.clone(),
            config.companyconfig_db.clone(),
            companyconfig::SCHEMA,
            Secrets::new(config.universe),
            None,
        )
        .with_settle_delay(config.settle_delay);
        let result = Operation::from(action).execute(&provisioner).await;
        provisioner.close().await?;
        result?;
        info!("companyconfig: {} done", Operation::from(action));
        return Ok(());
    }

    let companyconfig_db = Db::connect(&config.companyconfig_db, &Secrets::new(config.universe))
        .await
        .context("connecting to companyconfig")?;
    let pool = companyconfig_db.pool().clone();
    let secrets = config.secrets(&pool)?;

    let result = dispatch(command, config, &pool, secrets).await;
    companyconfig_db.close().await;
    result?;
    info!("done");
    Ok(())
}

async fn dispatch(
    command: Command,
    config: &Config,
    pool: &PgPool,
    secrets: Secrets,
) -> anyhow::Result<()> {
    match command {
        Command::Companyconfig { .. } => Ok(()),
        Command::Company {
            id,
            name,
            company_type,
            owner,
            action,
        } => {
            let company = CompanySpec {
                id,
                name,
                company_type: company_type.parse::<CompanyType>()?,
            };
            run_company(config, pool, &secrets, company, owner, action.into()).await
        }
        Command::Tenant {
            id,
            company_id,
            name,
            subdomain,
            override_prefix,
            action,
        } => {
            let company = CompanyConfigService::get_company(pool, company_id).await?;
            let url = generate_tenant_url(&company.name, &name, "https", &subdomain)?;
            let override_cfg = override_prefix
                .as_deref()
                .map(db_config_from_env)
                .transpose()?;
            let provisioner = TenantProvisioner::new(
                pool.clone(),
                TenantSpec {
                    id,
                    company_id,
                    name,
                    url,
                },
                TenantOptions::from_config(config).with_override(override_cfg),
                secrets,
            );
            Operation::from(action)
                .execute(&provisioner)
                .await
                .map_err(anyhow::Error::from)
        }
        Command::ValidateTenants {
            company_id,
            batch_size,
        } => {
            let tenants = CompanyConfigService::list_tenants(pool, company_id).await?;
            info!("validating {} tenants", tenants.len());
            let children: Vec<Arc<dyn Provisionable>> = tenants
                .into_iter()
                .map(|t| {
                    Arc::new(TenantProvisioner::new(
                        pool.clone(),
                        TenantSpec {
                            id: t.id,
                            company_id: t.company_id,
                            name: t.name,
                            url: t.url,
                        },
                        TenantOptions::from_config(config),
                        secrets.clone(),
                    )) as Arc<dyn Provisionable>
                })
                .collect();
            let batch = BatchProvisioner::new(format!("company {company_id}"), children, batch_size)?;
            batch
                .execute(&[Operation::Validate])
                .await
                .map_err(anyhow::Error::from)
        }
    }
}

/// Company login apps live in the console tenant's database; without one
/// only the company row is provisioned.
async fn run_company(
    config: &Config,
    pool: &PgPool,
    secrets: &Secrets,
    company: CompanySpec,
    owner: Option<Uuid>,
    op: Operation,
) -> anyhow::Result<()> {
    let mut pi = ProvisionInfo::new(pool.clone()).with_cache(config.cache.clone());
    let mut console_db = None;
    let mut reference_company_id = None;

    if let Some(console_id) = config.console_tenant_id {
        let console = CompanyConfigService::get_tenant(pool, console_id).await?;
        let internal = CompanyConfigService::get_tenant_internal(pool, console_id)
            .await?
            .with_context(|| format!("console tenant {console_id} has no databases"))?;
        let db = Db::connect(&internal.tenant_db, secrets).await?;
        pi = pi.with_tenant_db(console_id, db.pool().clone());
        reference_company_id = Some(console.company_id);
        console_db = Some(db);
    }

    let tree = new_company_provisioner(
        pi,
        company,
        CompanyOptions {
            owner,
            reference_company_id,
        },
    );
    let result = op.execute(&tree).await;
    if let Some(db) = console_db {
        db.close().await;
    }
    result?;
    Ok(())
}
