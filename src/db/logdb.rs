//! Schema of a per-tenant log database. It has no create-from-scratch
//! statements, so new log databases are always migrated step by step.

use crate::migrate::{Migration, Migrations, Schema};

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 0,
        table: "events",
        desc: "create events",
        up: r#"CREATE TABLE events (
            id          BIGSERIAL PRIMARY KEY,
            tenant_id   UUID NOT NULL,
            kind        VARCHAR(64) NOT NULL,
            payload     JSONB NOT NULL DEFAULT '{}',
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        down: "DROP TABLE events",
    },
    Migration {
        version: 1,
        table: "events",
        desc: "index events by time",
        up: "CREATE INDEX events_created_at_idx ON events (created_at)",
        down: "DROP INDEX events_created_at_idx",
    },
];

pub const SCHEMA: Schema = Schema {
    create_statements: None,
    migrations: Migrations::new(MIGRATIONS),
    postgres_only_extensions: &[],
};
