use thiserror::Error;
use uuid::Uuid;

use crate::provisioning::Operation;
use crate::universe::Universe;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unrecognized DB driver: {0}")]
    UnexpectedDriver(String),

    #[error("cannot nuke resources except in Dev universe: {0}")]
    UniverseGate(Universe),

    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("expected exactly 1 login app for company {company_id}, got {count}")]
    LoginAppCount { company_id: Uuid, count: usize },

    #[error("secret store: {0}")]
    Secret(String),

    #[error("signing key generation failed: {0}")]
    Key(String),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: i32,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("[{name}] {op} failed: {source}")]
    Node {
        name: String,
        op: Operation,
        #[source]
        source: Box<ProvisionError>,
    },
}

impl ProvisionError {
    /// Wraps the error with the node name and operation it surfaced from.
    pub fn in_node(self, name: &str, op: Operation) -> Self {
        ProvisionError::Node {
            name: name.to_string(),
            op,
            source: Box::new(self),
        }
    }

    /// The originating error, with every `Node` context layer peeled off.
    pub fn root_cause(&self) -> &ProvisionError {
        let mut current = self;
        while let ProvisionError::Node { source, .. } = current {
            current = source;
        }
        current
    }

    /// Node names from the outermost composite down to the failing leaf.
    pub fn node_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let ProvisionError::Node { name, source, .. } = current {
            path.push(name.as_str());
            current = source;
        }
        path
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ProvisionError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
