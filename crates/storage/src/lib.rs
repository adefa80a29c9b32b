pub mod db;
pub mod error;
pub mod store;

pub use db::{create_db, DbPool};
pub use error::StorageError;
pub use store::{BillStore, SqliteBillStore};
