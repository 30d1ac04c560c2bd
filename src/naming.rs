//! Deterministic resource names derived from tenant identifiers, plus the
//! `cluster.dbname` representation used to route a logical database to a
//! physical cluster.

use uuid::Uuid;

use crate::error::{ProvisionError, Result};

const MAX_TENANT_COMPONENT_NAME_LENGTH: usize = 25;
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Secret-store scope used for tenant DB passwords, regardless of which
/// service actually provisions the tenant DB.
pub const SERVICE_NAME_FOR_TENANT_DB_SECRET: &str = "console";

/// Secret-store scope used for tenant signing keys.
pub const SERVICE_NAME_FOR_SIGNING_KEYS: &str = "plex";

/// Returns the cluster prefix of a possibly cluster-prefixed database name,
/// including the trailing period, or an empty string for a bare name.
pub fn cluster_prefix(full_db_name: &str) -> &str {
    match full_db_name.find('.') {
        Some(idx) => &full_db_name[..=idx],
        None => "",
    }
}

/// Returns the bare database name with any cluster prefix stripped.
pub fn bare_db_name(full_db_name: &str) -> &str {
    match full_db_name.split_once('.') {
        Some((_, name)) => name,
        None => full_db_name,
    }
}

/// Joins a cluster prefix (as returned by [`cluster_prefix`]) and a bare name.
pub fn join_cluster_name(prefix: &str, db_name: &str) -> String {
    format!("{prefix}{db_name}")
}

pub fn tenant_db_name(tenant_id: Uuid) -> String {
    format!("tenantdb_{}", tenant_id.simple())
}

pub fn tenant_db_user(tenant_id: Uuid) -> String {
    format!("tenant_{}", tenant_id.simple())
}

pub fn log_db_name(tenant_id: Uuid) -> String {
    format!("logdb_{}", tenant_id.simple())
}

pub fn log_db_user(tenant_id: Uuid) -> String {
    format!("log_{}", tenant_id.simple())
}

/// Name of the secret that stores the password for a provisioned DB.
pub fn db_password_secret_name(db_name: &str) -> String {
    format!("{db_name}-dbpassword")
}

/// Name of the secret that stores a tenant's private signing key.
pub fn signing_key_secret_name(tenant_id: Uuid) -> String {
    format!("{tenant_id}-signing-private-key")
}

/// Database names are interpolated into DDL unquoted, so only lowercase
/// letters, digits and underscores are accepted.
pub fn validate_db_identifier(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(ProvisionError::InvalidIdentifier(name.to_string()))
    }
}

/// User names are always double-quoted in DDL (log DB users may be all
/// digits), so hyphens and mixed case are allowed.
pub fn validate_user_identifier(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ProvisionError::InvalidIdentifier(name.to_string()))
    }
}

/// Turns an arbitrary display name into a DNS-safe hostname label.
fn safe_hostname(name: &str) -> Result<String> {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_matches('-').to_string();
    if out.is_empty() {
        return Err(ProvisionError::Config(format!(
            "'{name}' does not contain any hostname-safe characters"
        )));
    }
    Ok(out)
}

/// Generates a consistent URL for a tenant, e.g.
/// `https://acme-prod.tenant.example.com`.
pub fn generate_tenant_url(
    company_name: &str,
    tenant_name: &str,
    protocol: &str,
    subdomain: &str,
) -> Result<String> {
    if company_name.len() > MAX_TENANT_COMPONENT_NAME_LENGTH {
        return Err(ProvisionError::Config(format!(
            "Company name '{company_name}' is too long (max {MAX_TENANT_COMPONENT_NAME_LENGTH} characters)"
        )));
    }
    if tenant_name.len() > MAX_TENANT_COMPONENT_NAME_LENGTH {
        return Err(ProvisionError::Config(format!(
            "Tenant name '{tenant_name}' is too long (max {MAX_TENANT_COMPONENT_NAME_LENGTH} characters)"
        )));
    }

    let hostname = safe_hostname(&format!("{company_name}-{tenant_name}"))?;
    Ok(format!("{protocol}://{hostname}.{subdomain}").to_lowercase())
}
