mod db;
mod error;
mod schema;

pub use db::{OutboxRecord, Store};
pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
