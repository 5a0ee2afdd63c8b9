pub mod ingest;
pub mod inventory;
pub mod query;
pub mod segment;
pub mod status;
