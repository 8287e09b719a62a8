//! Document Store Facade
//!
//! One method per MongoDB CRUD/query operation. Every data method takes a
//! `RequestContext` followed by an explicit `(database, collection)` pair and
//! forwards to the driver, returning the driver's own results and cursors.

pub mod context;
pub mod pipeline;
pub mod query;

pub use context::RequestContext;
pub use pipeline::{AggregationPipeline, AggregationStage};
pub use query::SortOrder;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{Bson, Document},
    options::{ClientOptions, UpdateOptions},
    results::{InsertManyResult, InsertOneResult, UpdateResult},
    Client, Collection, Cursor,
};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Handle over a MongoDB client
///
/// Cloning is cheap and clones share the driver's connection pool and the
/// root cancellation token.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    client: Client,
    root: CancellationToken,
    operation_timeout: Option<Duration>,
}

impl DocumentStore {
    /// Build a client from a connection string.
    ///
    /// The server is not contacted; use `is_connected` or `ping` to probe it.
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(StoreError::Connection)?;

        info!("Document store client created");
        Ok(Self::from_client(client))
    }

    /// Build a client from configuration, applying pool options over the URI
    pub async fn connect_with_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let mut client_options = ClientOptions::parse(&config.uri)
            .await
            .map_err(StoreError::Connection)?;

        let pool = &config.pool;
        client_options.max_pool_size = Some(pool.max_pool_size);
        client_options.min_pool_size = Some(pool.min_pool_size);
        client_options.connect_timeout = Some(Duration::from_millis(pool.connect_timeout_ms));
        client_options.server_selection_timeout =
            Some(Duration::from_millis(pool.server_selection_timeout_ms));
        client_options.max_idle_time = pool.max_idle_time_ms.map(Duration::from_millis);

        if let Some(ref app_name) = pool.app_name {
            client_options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(client_options).map_err(StoreError::Connection)?;

        info!(
            max_pool_size = pool.max_pool_size,
            operation_timeout_ms = ?config.operation_timeout_ms,
            "Document store client created"
        );

        let mut store = Self::from_client(client);
        store.operation_timeout = config.operation_timeout();
        Ok(store)
    }

    /// Wrap an existing driver client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            root: CancellationToken::new(),
            operation_timeout: None,
        }
    }

    /// Default deadline applied to contexts from `context()`
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fresh context, cancelled by `shutdown`, with the default deadline
    pub fn context(&self) -> RequestContext {
        RequestContext::from_token(self.root.child_token(), self.operation_timeout)
    }

    fn collection<T>(&self, database: &str, collection: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client.database(database).collection::<T>(collection)
    }

    /// Liveness probe against the primary; any failure is `false`
    pub async fn is_connected(&self, ctx: &RequestContext) -> bool {
        match self.ping(ctx).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Liveness probe failed: {}", e);
                false
            }
        }
    }

    /// Liveness probe against the primary, reporting why it failed
    pub async fn ping(&self, ctx: &RequestContext) -> Result<()> {
        ctx.run(
            "ping",
            self.client
                .database("admin")
                .run_command(query::ping_command())
                .selection_criteria(query::primary_selection()),
        )
        .await?;

        Ok(())
    }

    /// Increment the named counter and return its new value.
    ///
    /// The counter document is created on first use, so the first call
    /// returns 1.
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection, sequence = %sequence_name))]
    pub async fn next_sequence_value(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        sequence_name: &str,
    ) -> Result<i64> {
        const OPERATION: &str = "next_sequence_value";

        let updated = ctx
            .run(
                OPERATION,
                self.collection::<Document>(database, collection)
                    .find_one_and_update(
                        query::sequence_filter(sequence_name),
                        query::sequence_increment(),
                    )
                    .with_options(query::sequence_options()),
            )
            .await?
            .ok_or(StoreError::NoMatch {
                operation: OPERATION,
            })?;

        query::sequence_value(&updated).ok_or_else(|| {
            StoreError::Serialization(format!(
                "Sequence '{}' has a non-integer '{}' field",
                sequence_name,
                query::SEQUENCE_FIELD
            ))
        })
    }

    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn insert_one<T>(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        document: &T,
    ) -> Result<InsertOneResult>
    where
        T: Serialize + Send + Sync,
    {
        ctx.run(
            "insert_one",
            self.collection::<T>(database, collection)
                .insert_one(document)
                .with_options(query::insert_one_options()),
        )
        .await
    }

    /// Ordered insert: stops at the first failing document.
    ///
    /// On a partial failure the returned `ServerRejected` error wraps the
    /// driver's insert-many error, which lists the ids that did go in.
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn insert_many<T, I>(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        documents: I,
    ) -> Result<InsertManyResult>
    where
        T: Serialize + Send + Sync,
        I: IntoIterator<Item = T>,
    {
        ctx.run(
            "insert_many",
            self.collection::<T>(database, collection)
                .insert_many(documents)
                .with_options(query::insert_many_options()),
        )
        .await
    }

    /// Set only the fields named in `partial` on the first match
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn update_one(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        partial: Document,
    ) -> Result<UpdateResult> {
        ctx.run(
            "update_one",
            self.collection::<Document>(database, collection)
                .update_one(filter, query::merge_patch(partial)),
        )
        .await
    }

    /// `update_one` with caller options, typically `upsert: true`
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn update_one_with_upsert(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        partial: Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        ctx.run(
            "update_one_with_upsert",
            self.collection::<Document>(database, collection)
                .update_one(filter, query::merge_patch(partial))
                .with_options(options),
        )
        .await
    }

    /// Merge-patch every match; only the upserted id comes back
    pub async fn update_many(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        partial: Document,
    ) -> Result<Option<Bson>> {
        let result = self
            .update_many_with_result(ctx, database, collection, filter, partial)
            .await?;
        Ok(result.upserted_id)
    }

    /// Merge-patch every match, keeping matched/modified counts
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn update_many_with_result(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        partial: Document,
    ) -> Result<UpdateResult> {
        ctx.run(
            "update_many",
            self.collection::<Document>(database, collection)
                .update_many(filter, query::merge_patch(partial)),
        )
        .await
    }

    /// Exact count of matching documents
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn documents_count(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<u64> {
        ctx.run(
            "documents_count",
            self.collection::<Document>(database, collection)
                .count_documents(filter),
        )
        .await
    }

    /// Cursor over the match with the smallest `_id`
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn find_first(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<Cursor<Document>> {
        ctx.run(
            "find_first",
            self.collection::<Document>(database, collection)
                .find(filter)
                .with_options(query::first_options()),
        )
        .await
    }

    /// Cursor over the match with the largest `_id`
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn find_last(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<Cursor<Document>> {
        ctx.run(
            "find_last",
            self.collection::<Document>(database, collection)
                .find(filter)
                .with_options(query::last_options()),
        )
        .await
    }

    /// Single projected document; nothing found is `StoreError::NoMatch`
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn find_one(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        projection: impl Into<Option<Document>>,
    ) -> Result<Document> {
        const OPERATION: &str = "find_one";

        ctx.run(
            OPERATION,
            self.collection::<Document>(database, collection)
                .find_one(filter)
                .with_options(query::find_one_options(projection.into())),
        )
        .await?
        .ok_or(StoreError::NoMatch {
            operation: OPERATION,
        })
    }

    /// Unsorted, unlimited projected cursor
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn find(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        projection: impl Into<Option<Document>>,
    ) -> Result<Cursor<Document>> {
        ctx.run(
            "find",
            self.collection::<Document>(database, collection)
                .find(filter)
                .with_options(query::projected_options(projection.into())),
        )
        .await
    }

    /// Cursor sorted by a single field
    #[allow(clippy::too_many_arguments)]
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection, sort = %sort_field))]
    pub async fn find_sorted(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        projection: impl Into<Option<Document>>,
        sort_field: &str,
        order: SortOrder,
    ) -> Result<Cursor<Document>> {
        ctx.run(
            "find_sorted",
            self.collection::<Document>(database, collection)
                .find(filter)
                .with_options(query::sorted_options(projection.into(), sort_field, order)),
        )
        .await
    }

    /// Cursor over one page: skip, sort, limit and projection combined
    #[allow(clippy::too_many_arguments)]
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection, limit = limit))]
    pub async fn find_paginated(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
        projection: impl Into<Option<Document>>,
        skip: u64,
        sort: impl Into<Option<Document>>,
        limit: i64,
    ) -> Result<Cursor<Document>> {
        ctx.run(
            "find_paginated",
            self.collection::<Document>(database, collection)
                .find(filter)
                .with_options(query::paginated_options(
                    projection.into(),
                    skip,
                    sort.into(),
                    limit,
                )),
        )
        .await
    }

    /// Distinct values of `field_name` across matching documents
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection, field = %field_name))]
    pub async fn distinct(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        field_name: &str,
        filter: Document,
    ) -> Result<Vec<Bson>> {
        ctx.run(
            "distinct",
            self.collection::<Document>(database, collection)
                .distinct(field_name, filter),
        )
        .await
    }

    /// Cursor over an aggregation pipeline
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn custom_aggregate<P>(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        pipeline: P,
    ) -> Result<Cursor<Document>>
    where
        P: IntoIterator<Item = Document>,
    {
        ctx.run(
            "custom_aggregate",
            self.collection::<Document>(database, collection)
                .aggregate(pipeline),
        )
        .await
    }

    /// Delete the first match; returns 0 or 1
    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn delete_one(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<u64> {
        let result = ctx
            .run(
                "delete_one",
                self.collection::<Document>(database, collection)
                    .delete_one(filter),
            )
            .await?;
        Ok(result.deleted_count)
    }

    #[instrument(level = "debug", skip_all, fields(db = %database, coll = %collection))]
    pub async fn delete_many(
        &self,
        ctx: &RequestContext,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<u64> {
        let result = ctx
            .run(
                "delete_many",
                self.collection::<Document>(database, collection)
                    .delete_many(filter),
            )
            .await?;
        Ok(result.deleted_count)
    }

    /// Drain a cursor under the context's cancellation and deadline
    pub async fn collect(
        &self,
        ctx: &RequestContext,
        cursor: Cursor<Document>,
    ) -> Result<Vec<Document>> {
        ctx.run("collect", cursor.try_collect::<Vec<Document>>())
            .await
    }

    /// Cancel every context handed out by this store and close the pool
    pub async fn shutdown(self) {
        self.root.cancel();
        self.client.shutdown().await;
        info!("Document store shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    const UNREACHABLE_URI: &str =
        "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200";

    #[tokio::test]
    async fn test_connect_does_not_contact_server() {
        let store = DocumentStore::connect(UNREACHABLE_URI).await;
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_context_inherits_store_cancellation() {
        let store = DocumentStore::connect(UNREACHABLE_URI)
            .await
            .unwrap()
            .with_operation_timeout(Some(Duration::from_secs(3)));

        let ctx = store.context();
        assert!(ctx.remaining().is_some());

        store.root.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_driver() {
        let store = DocumentStore::connect(UNREACHABLE_URI).await.unwrap();
        let ctx = RequestContext::new();
        ctx.cancel();

        let err = store
            .documents_count(&ctx, "app", "users", doc! {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Cancelled {
                operation: "documents_count"
            }
        ));

        let err = store
            .find_one(&ctx, "app", "users", doc! { "_id": 1 }, None)
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
    }

    #[tokio::test]
    async fn test_unreachable_ping_is_network_error() {
        let store = DocumentStore::connect(UNREACHABLE_URI).await.unwrap();
        let ctx = RequestContext::with_timeout(Duration::from_secs(10));

        let err = store.ping(&ctx).await.unwrap_err();
        assert!(err.is_network(), "unexpected error kind: {:?}", err);
        assert!(!store.is_connected(&ctx).await);
    }
}
