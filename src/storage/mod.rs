pub mod db;
pub mod models;
mod store;
mod tables;

pub use db::{Database, DatabaseError};
pub use store::{MemoryStore, RecordStore, StoreError, WriteOp};
pub use tables::*;
