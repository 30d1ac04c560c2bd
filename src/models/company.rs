use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyType {
    #[default]
    Customer,
    Partner,
    Internal,
}

impl CompanyType {
    pub fn as_str(self) -> &'static str {
        match self {
            CompanyType::Customer => "customer",
            CompanyType::Partner => "partner",
            CompanyType::Internal => "internal",
        }
    }
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyType {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(CompanyType::Customer),
            "partner" => Ok(CompanyType::Partner),
            "internal" => Ok(CompanyType::Internal),
            other => Err(ProvisionError::Config(format!("unknown company type '{other}'"))),
        }
    }
}

impl TryFrom<String> for CompanyType {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub company_type: CompanyType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields a caller chooses when provisioning a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanySpec {
    pub id: Uuid,
    pub name: String,
    pub company_type: CompanyType,
}

impl CompanySpec {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            company_type: CompanyType::default(),
        }
    }
}
