//! Core module - storage, query building and tracker operations

pub mod aggregate;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod order;
pub mod placeholder;
pub mod query;
pub mod row;
pub mod schema;
pub mod search;
pub mod store;

pub use aggregate::{SearchResults, TestRecord, WipRecord};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use mapping::{SchemaMapper, Table};
pub use order::{insert_new_order, DisplacerOrder, NewOrder, OrderReceipt};
pub use query::{InsertStatement, SelectQuery, Statement, UpdateStatement};
pub use row::Row;
pub use search::{flexible_search, SearchCriteria};
pub use store::{Fields, RepStore, Session};
