//! # Catalog Module
//!
//! The durable gateway (C4): a SQLite-backed store for catalogs, images,
//! duplicate/burst groups, and (via [`crate::jobs::store`]) jobs and job
//! batches. `traits::CatalogGateway` is the narrow, storage-agnostic
//! interface job processors consume; `sqlite::SqliteCatalog` is the only
//! implementation this crate ships.

pub mod model;
pub mod sqlite;
pub mod traits;

pub use model::*;
pub use sqlite::SqliteCatalog;
pub use traits::{CatalogGateway, ImageHashRow, ImageTimestampRow};
