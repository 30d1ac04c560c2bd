//! DDL issued while bootstrapping or tearing down a database. Callers must
//! pass bare database names that already passed
//! [`crate::naming::validate_db_identifier`] and user names that passed
//! [`crate::naming::validate_user_identifier`].

use super::DbProduct;

pub const COUNT_USERS: &str = "SELECT COUNT(usename) FROM pg_user WHERE usename=$1";
pub const COUNT_DATABASES: &str = "SELECT COUNT(datname) FROM pg_database WHERE datname=$1";
pub const LIST_DATABASES: &str = "SELECT datname FROM pg_database WHERE datistemplate = false";

/// Quotes are needed around user names because log DB users may be all digits.
pub fn create_user(user: &str, password: &str) -> String {
    let q = format!(r#"CREATE USER "{user}""#);
    if password.is_empty() {
        q
    } else {
        format!("{q} LOGIN PASSWORD '{}'", escape_literal(password))
    }
}

pub fn create_database(db_name: &str, product: DbProduct) -> String {
    match product {
        DbProduct::AwsAuroraPostgres => format!(
            "CREATE DATABASE {db_name} WITH ENCODING UTF8 LC_COLLATE 'C' LC_CTYPE 'C' TEMPLATE template0"
        ),
        DbProduct::Postgres => format!("CREATE DATABASE {db_name}"),
    }
}

pub fn grant_all_on_database(db_name: &str, user: &str) -> String {
    format!(r#"GRANT ALL PRIVILEGES ON DATABASE {db_name} TO "{user}""#)
}

pub fn grant_public_schema(user: &str) -> String {
    format!(r#"GRANT USAGE ON SCHEMA public TO "{user}"; GRANT CREATE ON SCHEMA public TO "{user}""#)
}

pub fn grant_role(role: &str, member: &str) -> String {
    format!(r#"GRANT "{role}" TO "{member}""#)
}

pub fn alter_database_owner(db_name: &str, owner: &str) -> String {
    format!(r#"ALTER DATABASE {db_name} OWNER TO "{owner}""#)
}

pub fn revoke_role(role: &str, member: &str) -> String {
    format!(r#"REVOKE "{role}" FROM "{member}""#)
}

pub fn grant_all_tables(user: &str) -> String {
    format!(r#"GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA public TO "{user}""#)
}

pub fn drop_database(db_name: &str) -> String {
    format!("DROP DATABASE IF EXISTS {db_name}")
}

pub fn drop_user(user: &str) -> String {
    format!(r#"DROP USER IF EXISTS "{user}""#)
}

pub fn create_extension(extension: &str) -> String {
    format!(r#"CREATE EXTENSION IF NOT EXISTS "{extension}""#)
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
