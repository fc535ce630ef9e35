//! Database module: administrator identity storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for PostgreSQL and SQLite
//! - `admins.rs`: the `AdminStore` trait and its per-backend impls

pub mod admins;
pub mod models;
pub mod schema;

pub use admins::AdminStore;
pub use models::AdminIdentity;
pub use schema::{POSTGRES_INIT, SQLITE_INIT};
