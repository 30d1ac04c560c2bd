// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod naming;
pub mod provisioning;
pub mod secret;
pub mod services;
pub mod universe;

pub use error::{ProvisionError, Result};
