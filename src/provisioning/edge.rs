use async_trait::async_trait;
use uuid::Uuid;

use super::{Named, Operation, Parallelizable, ProvisionInfo, Provisionable};
use crate::error::{ProvisionError, Result};
use crate::models::edge::Edge;
use crate::services::tenantdb::TenantDbService;

/// Ensures one access-control edge exists in the tenant database.
pub struct EdgeProvisioner {
    named: Named,
    pi: ProvisionInfo,
    edge: Edge,
}

impl EdgeProvisioner {
    pub fn new(pi: ProvisionInfo, edge: Edge) -> Self {
        Self {
            named: Named::new(format!(
                "edge {}:{} {} {}:{}",
                edge.src_type, edge.src_id, edge.relation, edge.dst_type, edge.dst_id
            )),
            pi,
            edge,
        }
    }

    /// Makes `owner` an admin of `company_id`.
    pub fn company_admin(pi: ProvisionInfo, owner: Uuid, company_id: Uuid) -> Self {
        Self::new(pi, Edge::company_admin(owner, company_id))
    }
}

#[async_trait]
impl Provisionable for EdgeProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    fn is_executable_in_parallel(&self, op: Operation) -> bool {
        Parallelizable::All.allows(op)
    }

    async fn provision(&self) -> Result<()> {
        TenantDbService::save_edge(self.pi.require_tenant_db()?, &self.edge).await
    }

    async fn validate(&self) -> Result<()> {
        if TenantDbService::edge_exists(self.pi.require_tenant_db()?, &self.edge).await? {
            Ok(())
        } else {
            Err(ProvisionError::not_found("edge", self.name()))
        }
    }

    async fn cleanup(&self) -> Result<()> {
        TenantDbService::delete_edge(self.pi.require_tenant_db()?, &self.edge).await
    }
}
