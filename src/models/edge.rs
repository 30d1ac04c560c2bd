use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const RELATION_ADMIN: &str = "_admin";
pub const TYPE_USER: &str = "user";
pub const TYPE_COMPANY: &str = "company";

/// A directed access-control relation, e.g. user `u` is `_admin` of company `c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Edge {
    pub src_type: String,
    pub src_id: Uuid,
    pub relation: String,
    pub dst_type: String,
    pub dst_id: Uuid,
}

impl Edge {
    pub fn company_admin(user_id: Uuid, company_id: Uuid) -> Self {
        Self {
            src_type: TYPE_USER.into(),
            src_id: user_id,
            relation: RELATION_ADMIN.into(),
            dst_type: TYPE_COMPANY.into(),
            dst_id: company_id,
        }
    }
}
