use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The deployment environment a provisioning run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Universe {
    Dev,
    Test,
    Ci,
    Container,
    Debug,
    Staging,
    Prod,
    OnPrem,
}

impl Universe {
    /// Universes where tenants are routinely created and torn down.
    pub fn is_dev(self) -> bool {
        matches!(
            self,
            Universe::Dev | Universe::Test | Universe::Ci | Universe::Container
        )
    }

    /// Universes whose secrets are kept as literals rather than in a store.
    pub fn uses_literal_secrets(self) -> bool {
        matches!(
            self,
            Universe::Dev | Universe::Test | Universe::Ci | Universe::Container | Universe::Debug
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Universe::Dev => "dev",
            Universe::Test => "test",
            Universe::Ci => "ci",
            Universe::Container => "container",
            Universe::Debug => "debug",
            Universe::Staging => "staging",
            Universe::Prod => "prod",
            Universe::OnPrem => "onprem",
        }
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Universe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Universe::Dev),
            "test" => Ok(Universe::Test),
            "ci" => Ok(Universe::Ci),
            "container" => Ok(Universe::Container),
            "debug" => Ok(Universe::Debug),
            "staging" => Ok(Universe::Staging),
            "prod" => Ok(Universe::Prod),
            "onprem" => Ok(Universe::OnPrem),
            other => Err(format!("unknown universe '{other}'")),
        }
    }
}
