pub mod companyconfig;
pub mod encryption;
pub mod metrics;
pub mod secrets;
pub mod tenantdb;
