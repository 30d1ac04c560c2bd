//! Versioned schema migrations tracked in a `migrations` table.
//! Version `-1` means no migration was ever applied.

use sqlx::Executor;
use tracing::{debug, info};

use crate::db::{statements, Db};
use crate::error::{ProvisionError, Result};

pub const NO_MIGRATIONS: i32 = -1;

const CREATE_MIGRATIONS_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS migrations (
    version    INT NOT NULL PRIMARY KEY,
    tbl        VARCHAR NOT NULL DEFAULT '',
    dsc        VARCHAR NOT NULL DEFAULT '',
    up         VARCHAR NOT NULL DEFAULT '',
    down       VARCHAR NOT NULL DEFAULT '',
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub table: &'static str,
    pub desc: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// An ordered list of migrations whose versions run 0, 1, 2, ...
#[derive(Debug, Clone, Copy)]
pub struct Migrations(&'static [Migration]);

impl Migrations {
    pub const fn new(migrations: &'static [Migration]) -> Self {
        Self(migrations)
    }

    /// The first `count` migrations, for baseline schemas frozen at an
    /// earlier version.
    pub fn prefix(self, count: usize) -> Self {
        Self(&self.0[..count.min(self.0.len())])
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'static Migration> {
        self.0.iter()
    }

    pub fn max_available(&self) -> i32 {
        self.0.last().map_or(NO_MIGRATIONS, |m| m.version)
    }

    /// Versions must be contiguous from 0.
    pub fn check(&self) -> Result<()> {
        for (idx, m) in self.0.iter().enumerate() {
            if m.version != idx as i32 {
                return Err(ProvisionError::Config(format!(
                    "migration at position {idx} has version {}",
                    m.version
                )));
            }
        }
        Ok(())
    }

    /// Runs up migrations in `(from, to]` or down migrations in `(to, from]`,
    /// each in its own transaction.
    pub async fn do_migration(&self, db: &Db, from: i32, to: i32) -> Result<()> {
        if to > from {
            for m in self.iter().filter(|m| m.version > from && m.version <= to) {
                info!("applying migration {} on {}: {}", m.version, db.db_name(), m.desc);
                apply_up(db, m).await?;
            }
        } else if to < from {
            for m in self.iter().rev().filter(|m| m.version <= from && m.version > to) {
                info!("reverting migration {} on {}: {}", m.version, db.db_name(), m.desc);
                apply_down(db, m).await?;
            }
        } else {
            debug!("{} already at migration version {to}", db.db_name());
        }
        Ok(())
    }
}

async fn apply_up(db: &Db, m: &Migration) -> Result<()> {
    let wrap = |source| ProvisionError::Migration {
        version: m.version,
        source,
    };
    let mut tx = db.pool().begin().await.map_err(wrap)?;
    (&mut *tx).execute(sqlx::raw_sql(m.up)).await.map_err(wrap)?;
    record(&mut tx, m).await.map_err(wrap)?;
    tx.commit().await.map_err(wrap)
}

async fn apply_down(db: &Db, m: &Migration) -> Result<()> {
    let wrap = |source| ProvisionError::Migration {
        version: m.version,
        source,
    };
    let mut tx = db.pool().begin().await.map_err(wrap)?;
    (&mut *tx).execute(sqlx::raw_sql(m.down)).await.map_err(wrap)?;
    sqlx::query("DELETE FROM migrations WHERE version = $1")
        .bind(m.version)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?;
    tx.commit().await.map_err(wrap)
}

async fn record(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, m: &Migration) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO migrations (version, tbl, dsc, up, down) VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (version) DO NOTHING",
    )
    .bind(m.version)
    .bind(m.table)
    .bind(m.desc)
    .bind(m.up)
    .bind(m.down)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Everything needed to bring a database to its current shape: either all
/// at once from `create_statements`, or step by step from `migrations`.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub create_statements: Option<&'static [&'static str]>,
    pub migrations: Migrations,
    pub postgres_only_extensions: &'static [&'static str],
}

impl Schema {
    /// Creates every table directly and marks all migrations as applied.
    pub async fn apply(&self, db: &Db) -> Result<()> {
        let statements = self.create_statements.unwrap_or_default();
        let mut tx = db.pool().begin().await?;
        for statement in statements {
            (&mut *tx).execute(sqlx::raw_sql(statement)).await?;
        }
        for m in self.migrations.iter() {
            record(&mut tx, m).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

pub async fn create_migrations_table(db: &Db) -> Result<()> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn enable_postgres_extensions(db: &Db, extensions: &[&str]) -> Result<()> {
    for extension in extensions {
        sqlx::raw_sql(&statements::create_extension(extension))
            .execute(db.pool())
            .await?;
    }
    Ok(())
}

pub async fn get_max_version(db: &Db) -> Result<i32> {
    let version: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), -1) FROM migrations")
        .fetch_one(db.pool())
        .await?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    static GOOD: [Migration; 2] = [
        Migration {
            version: 0,
            table: "a",
            desc: "create a",
            up: "CREATE TABLE a (id INT)",
            down: "DROP TABLE a",
        },
        Migration {
            version: 1,
            table: "b",
            desc: "create b",
            up: "CREATE TABLE b (id INT)",
            down: "DROP TABLE b",
        },
    ];

    static GAPPED: [Migration; 1] = [Migration {
        version: 3,
        table: "a",
        desc: "gap",
        up: "",
        down: "",
    }];

    #[test]
    fn max_available_and_prefix() {
        let m = Migrations::new(&GOOD);
        assert_eq!(m.max_available(), 1);
        assert_eq!(m.prefix(1).max_available(), 0);
        assert_eq!(m.prefix(0).max_available(), NO_MIGRATIONS);
        assert_eq!(m.prefix(10).max_available(), 1);
        assert!(m.check().is_ok());
        assert!(Migrations::new(&GAPPED).check().is_err());
    }
}
