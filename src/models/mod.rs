pub mod company;
pub mod edge;
pub mod keys;
pub mod organization;
pub mod tenant;
