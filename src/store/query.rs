//! Query builders
//!
//! Pure functions producing the filters, update documents and driver options
//! each facade operation sends. Nothing here touches the network.

use crate::error::{Result, StoreError};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOneOptions, FindOptions, InsertManyOptions, InsertOneOptions,
    ReadPreference, ReturnDocument, SelectionCriteria,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Primary key field
pub const ID_FIELD: &str = "_id";

/// Counter field of a sequence document
pub const SEQUENCE_FIELD: &str = "seq";

/// Sort direction for a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Driver direction value (`1` / `-1`)
    pub fn direction(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    /// Positive is ascending, negative is descending, zero is rejected
    pub fn from_direction(direction: i64) -> Option<Self> {
        match direction.signum() {
            1 => Some(SortOrder::Ascending),
            -1 => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

/// `{$set: partial}`: only the named fields change
pub fn merge_patch(partial: Document) -> Document {
    doc! { "$set": partial }
}

pub fn sequence_filter(sequence_name: &str) -> Document {
    doc! { ID_FIELD: sequence_name }
}

pub fn sequence_increment() -> Document {
    doc! { "$inc": { SEQUENCE_FIELD: 1 } }
}

/// Upsert the counter and hand back the post-increment document
pub fn sequence_options() -> FindOneAndUpdateOptions {
    let mut options = FindOneAndUpdateOptions::default();
    options.upsert = Some(true);
    options.return_document = Some(ReturnDocument::After);
    options
}

/// Read the counter out of a sequence document
pub fn sequence_value(document: &Document) -> Option<i64> {
    match document.get(SEQUENCE_FIELD)? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    }
}

pub fn insert_one_options() -> InsertOneOptions {
    let mut options = InsertOneOptions::default();
    options.bypass_document_validation = Some(false);
    options
}

/// Ordered: the server stops at the first failing document
pub fn insert_many_options() -> InsertManyOptions {
    let mut options = InsertManyOptions::default();
    options.ordered = Some(true);
    options
}

pub fn first_options() -> FindOptions {
    single_by_id(SortOrder::Ascending)
}

pub fn last_options() -> FindOptions {
    single_by_id(SortOrder::Descending)
}

fn single_by_id(order: SortOrder) -> FindOptions {
    let mut options = FindOptions::default();
    options.sort = Some(doc! { ID_FIELD: order.direction() });
    options.limit = Some(1);
    options
}

pub fn find_one_options(projection: Option<Document>) -> FindOneOptions {
    let mut options = FindOneOptions::default();
    options.projection = projection;
    options
}

/// Projection only, large result sets may spill to disk
pub fn projected_options(projection: Option<Document>) -> FindOptions {
    let mut options = FindOptions::default();
    options.projection = projection;
    options.allow_disk_use = Some(true);
    options
}

pub fn sorted_options(
    projection: Option<Document>,
    sort_field: &str,
    order: SortOrder,
) -> FindOptions {
    let mut options = FindOptions::default();
    options.projection = projection;
    options.sort = Some(doc! { sort_field: order.direction() });
    options
}

pub fn paginated_options(
    projection: Option<Document>,
    skip: u64,
    sort: Option<Document>,
    limit: i64,
) -> FindOptions {
    let mut options = FindOptions::default();
    options.projection = projection;
    options.skip = Some(skip);
    options.sort = sort;
    options.limit = Some(limit);
    options.allow_disk_use = Some(true);
    options
}

/// Liveness probe command
pub fn ping_command() -> Document {
    doc! { "ping": 1 }
}

pub fn primary_selection() -> SelectionCriteria {
    SelectionCriteria::ReadPreference(ReadPreference::Primary)
}

/// Convert a JSON object into a BSON document
pub fn document_from_json(json: JsonValue) -> Result<Document> {
    let bson = Bson::try_from(json)
        .map_err(|e| StoreError::Serialization(format!("JSON to BSON error: {}", e)))?;

    if let Bson::Document(doc) = bson {
        Ok(doc)
    } else {
        Err(StoreError::Serialization(
            "Expected JSON object".to_string(),
        ))
    }
}
