pub mod client;
pub mod metafields;
pub mod queries;
