//! Schema of the company-config database: companies, their tenants, where
//! each tenant's databases live, and the encrypted secret store.

use crate::migrate::{Migration, Migrations, Schema};

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 0,
        table: "companies",
        desc: "create companies",
        up: r#"CREATE TABLE companies (
            id           UUID PRIMARY KEY,
            name         VARCHAR(255) NOT NULL,
            company_type VARCHAR(32) NOT NULL DEFAULT 'customer',
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        down: "DROP TABLE companies",
    },
    Migration {
        version: 1,
        table: "tenants",
        desc: "create tenants",
        up: r#"CREATE TABLE tenants (
            id          UUID PRIMARY KEY,
            company_id  UUID NOT NULL REFERENCES companies(id),
            name        VARCHAR(255) NOT NULL,
            url         VARCHAR(512) NOT NULL DEFAULT '',
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (company_id, name)
        )"#,
        down: "DROP TABLE tenants",
    },
    Migration {
        version: 2,
        table: "tenants_internal",
        desc: "create tenants_internal",
        up: r#"CREATE TABLE tenants_internal (
            tenant_id   UUID PRIMARY KEY REFERENCES tenants(id) ON DELETE CASCADE,
            tenant_db   JSONB NOT NULL,
            log_db      JSONB NOT NULL,
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        down: "DROP TABLE tenants_internal",
    },
    Migration {
        version: 3,
        table: "secrets",
        desc: "create secrets",
        up: r#"CREATE TABLE secrets (
            scope       VARCHAR(128) NOT NULL,
            name        VARCHAR(255) NOT NULL,
            ciphertext  BYTEA NOT NULL,
            iv          BYTEA NOT NULL,
            tag         BYTEA NOT NULL,
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (scope, name)
        )"#,
        down: "DROP TABLE secrets",
    },
];

const CREATE_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS companies (
        id           UUID PRIMARY KEY,
        name         VARCHAR(255) NOT NULL,
        company_type VARCHAR(32) NOT NULL DEFAULT 'customer',
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tenants (
        id          UUID PRIMARY KEY,
        company_id  UUID NOT NULL REFERENCES companies(id),
        name        VARCHAR(255) NOT NULL,
        url         VARCHAR(512) NOT NULL DEFAULT '',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (company_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tenants_internal (
        tenant_id   UUID PRIMARY KEY REFERENCES tenants(id) ON DELETE CASCADE,
        tenant_db   JSONB NOT NULL,
        log_db      JSONB NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS secrets (
        scope       VARCHAR(128) NOT NULL,
        name        VARCHAR(255) NOT NULL,
        ciphertext  BYTEA NOT NULL,
        iv          BYTEA NOT NULL,
        tag         BYTEA NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (scope, name)
    )"#,
];

pub const SCHEMA: Schema = Schema {
    create_statements: Some(CREATE_STATEMENTS),
    migrations: Migrations::new(MIGRATIONS),
    postgres_only_extensions: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_contiguous() {
        SCHEMA.migrations.check().unwrap();
        assert_eq!(SCHEMA.migrations.max_available(), 3);
    }
}
