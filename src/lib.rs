//! # docstore-rs
//!
//! Thin async facade over the MongoDB driver.
//!
//! `DocumentStore` exposes one method per CRUD/query operation with fixed
//! parameter shapes: a `RequestContext` (cancellation token and deadline),
//! then the database and collection names, then filter, projection, sort and
//! pagination arguments as BSON documents. Results are the driver's own
//! cursors and result types; failures are classified into `StoreError`.
//!
//! ```no_run
//! use docstore::{DocumentStore, RequestContext};
//! use mongodb::bson::doc;
//! use std::time::Duration;
//!
//! # async fn run() -> docstore::Result<()> {
//! let store = DocumentStore::connect("mongodb://localhost:27017").await?;
//! let ctx = RequestContext::with_timeout(Duration::from_secs(5));
//!
//! let id = store.next_sequence_value(&ctx, "app", "counters", "orders").await?;
//! store
//!     .insert_one(&ctx, "app", "orders", &doc! { "_id": id, "total": 42 })
//!     .await?;
//! let order = store
//!     .find_one(&ctx, "app", "orders", doc! { "_id": id }, doc! { "total": 1 })
//!     .await?;
//! # let _ = order;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod store;

pub use config::{PoolOptions, StoreConfig};
pub use error::{Result, StoreError};
pub use store::{
    AggregationPipeline, AggregationStage, DocumentStore, RequestContext, SortOrder,
};

/// Re-exported driver crate, so callers use the same `bson` version
pub use mongodb;
