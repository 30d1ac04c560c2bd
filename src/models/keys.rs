use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::secret::SecretString;

/// A freshly generated signing key pair. The private half is only ever
/// held as a reference into the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBundle {
    pub key_id: String,
    pub public_key: String,
    pub private_key: SecretString,
}

#[derive(Debug, Clone, FromRow)]
pub struct SigningKey {
    pub key_id: String,
    pub tenant_id: Uuid,
    pub public_key: String,
    #[sqlx(try_from = "String")]
    pub private_key: SecretString,
    pub created_at: DateTime<Utc>,
}
