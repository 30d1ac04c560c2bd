//! Schema of a per-tenant database.

use crate::migrate::{Migration, Migrations, Schema};

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 0,
        table: "organizations",
        desc: "create organizations",
        up: r#"CREATE TABLE organizations (
            id          UUID PRIMARY KEY,
            company_id  UUID NOT NULL,
            name        VARCHAR(255) NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        down: "DROP TABLE organizations",
    },
    Migration {
        version: 1,
        table: "login_apps",
        desc: "create login_apps",
        up: r#"CREATE TABLE login_apps (
            id          UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            company_id  UUID NOT NULL,
            name        VARCHAR(255) NOT NULL,
            settings    JSONB NOT NULL DEFAULT '{}',
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        CREATE INDEX login_apps_company_id_idx ON login_apps (company_id)"#,
        down: "DROP TABLE login_apps",
    },
    Migration {
        version: 2,
        table: "authz_edges",
        desc: "create authz_edges",
        up: r#"CREATE TABLE authz_edges (
            id          UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            src_type    VARCHAR(64) NOT NULL,
            src_id      UUID NOT NULL,
            relation    VARCHAR(64) NOT NULL,
            dst_type    VARCHAR(64) NOT NULL,
            dst_id      UUID NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (src_type, src_id, relation, dst_type, dst_id)
        )"#,
        down: "DROP TABLE authz_edges",
    },
    Migration {
        version: 3,
        table: "signing_keys",
        desc: "create signing_keys",
        up: r#"CREATE TABLE signing_keys (
            key_id       VARCHAR(16) PRIMARY KEY,
            tenant_id    UUID NOT NULL,
            public_key   TEXT NOT NULL,
            private_key  VARCHAR(512) NOT NULL,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        down: "DROP TABLE signing_keys",
    },
];

const ORGANIZATIONS: &str = r#"CREATE TABLE IF NOT EXISTS organizations (
    id          UUID PRIMARY KEY,
    company_id  UUID NOT NULL,
    name        VARCHAR(255) NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

const LOGIN_APPS: &str = r#"CREATE TABLE IF NOT EXISTS login_apps (
    id          UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
    company_id  UUID NOT NULL,
    name        VARCHAR(255) NOT NULL,
    settings    JSONB NOT NULL DEFAULT '{}',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS login_apps_company_id_idx ON login_apps (company_id)"#;

const AUTHZ_EDGES: &str = r#"CREATE TABLE IF NOT EXISTS authz_edges (
    id          UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
    src_type    VARCHAR(64) NOT NULL,
    src_id      UUID NOT NULL,
    relation    VARCHAR(64) NOT NULL,
    dst_type    VARCHAR(64) NOT NULL,
    dst_id      UUID NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (src_type, src_id, relation, dst_type, dst_id)
)"#;

const SIGNING_KEYS: &str = r#"CREATE TABLE IF NOT EXISTS signing_keys (
    key_id       VARCHAR(16) PRIMARY KEY,
    tenant_id    UUID NOT NULL,
    public_key   TEXT NOT NULL,
    private_key  VARCHAR(512) NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

const EXTENSIONS: &[&str] = &["uuid-ossp"];

pub const SCHEMA: Schema = Schema {
    create_statements: Some(&[ORGANIZATIONS, LOGIN_APPS, AUTHZ_EDGES, SIGNING_KEYS]),
    migrations: Migrations::new(MIGRATIONS),
    postgres_only_extensions: EXTENSIONS,
};

/// Number of migrations folded into [`baseline_schema`].
const BASELINE_MIGRATIONS: usize = 2;

/// The tenant schema frozen at an earlier version. Test setups create from
/// this and migrate forward so the migrations themselves stay exercised.
pub fn baseline_schema() -> Schema {
    Schema {
        create_statements: Some(&[ORGANIZATIONS, LOGIN_APPS]),
        migrations: SCHEMA.migrations.prefix(BASELINE_MIGRATIONS),
        postgres_only_extensions: EXTENSIONS,
    }
}
