//! Aggregation pipeline builder

use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

/// Ordered aggregation pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationPipeline {
    /// Pipeline stages
    pub stages: Vec<AggregationStage>,
}

impl AggregationPipeline {
    /// Create new pipeline
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add match stage
    pub fn match_stage(mut self, filter: Document) -> Self {
        self.stages.push(AggregationStage::Match(filter));
        self
    }

    /// Add group stage
    pub fn group_stage(mut self, group_spec: Document) -> Self {
        self.stages.push(AggregationStage::Group(group_spec));
        self
    }

    /// Add sort stage
    pub fn sort_stage(mut self, sort_spec: Document) -> Self {
        self.stages.push(AggregationStage::Sort(sort_spec));
        self
    }

    pub fn project_stage(mut self, projection: Document) -> Self {
        self.stages.push(AggregationStage::Project(projection));
        self
    }

    pub fn lookup_stage(mut self, lookup: Document) -> Self {
        self.stages.push(AggregationStage::Lookup(lookup));
        self
    }

    /// Add unwind stage (`"$field"` or an options document)
    pub fn unwind_stage(mut self, path: impl Into<Bson>) -> Self {
        self.stages.push(AggregationStage::Unwind(path.into()));
        self
    }

    /// Add limit stage
    pub fn limit_stage(mut self, limit: i64) -> Self {
        self.stages.push(AggregationStage::Limit(limit));
        self
    }

    /// Add skip stage
    pub fn skip_stage(mut self, skip: i64) -> Self {
        self.stages.push(AggregationStage::Skip(skip));
        self
    }

    /// Raw stage document, for operators without a builder
    pub fn raw_stage(mut self, stage: Document) -> Self {
        self.stages.push(AggregationStage::Raw(stage));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Render to the stage documents sent to the server
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(AggregationStage::to_document).collect()
    }
}

impl IntoIterator for AggregationPipeline {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.to_documents().into_iter()
    }
}

/// Aggregation Pipeline Stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregationStage {
    /// $match - Filter documents
    Match(Document),
    /// $group - Group by field
    Group(Document),
    /// $sort - Sort results
    Sort(Document),
    /// $limit - Limit results
    Limit(i64),
    /// $skip - Skip documents
    Skip(i64),
    /// $project - Project fields
    Project(Document),
    /// $lookup - Join collections
    Lookup(Document),
    /// $unwind - Unwind array
    Unwind(Bson),
    /// Passed through as-is
    Raw(Document),
}

impl AggregationStage {
    pub fn to_document(&self) -> Document {
        match self {
            AggregationStage::Match(spec) => doc! { "$match": spec.clone() },
            AggregationStage::Group(spec) => doc! { "$group": spec.clone() },
            AggregationStage::Sort(spec) => doc! { "$sort": spec.clone() },
            AggregationStage::Limit(n) => doc! { "$limit": *n },
            AggregationStage::Skip(n) => doc! { "$skip": *n },
            AggregationStage::Project(spec) => doc! { "$project": spec.clone() },
            AggregationStage::Lookup(spec) => doc! { "$lookup": spec.clone() },
            AggregationStage::Unwind(path) => doc! { "$unwind": path.clone() },
            AggregationStage::Raw(stage) => stage.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_pipeline_builder() {
        let pipeline = AggregationPipeline::new()
            .match_stage(doc! { "status": "active" })
            .group_stage(doc! { "_id": "$category", "count": { "$sum": 1 } })
            .sort_stage(doc! { "count": -1 })
            .limit_stage(10);

        assert_eq!(pipeline.len(), 4);
        assert_eq!(
            pipeline.to_documents(),
            vec![
                doc! { "$match": { "status": "active" } },
                doc! { "$group": { "_id": "$category", "count": { "$sum": 1 } } },
                doc! { "$sort": { "count": -1 } },
                doc! { "$limit": 10_i64 },
            ]
        );
    }

    #[test]
    fn test_unwind_and_raw_stages() {
        let stages: Vec<Document> = AggregationPipeline::new()
            .unwind_stage("$tags")
            .raw_stage(doc! { "$count": "total" })
            .skip_stage(5)
            .into_iter()
            .collect();

        assert_eq!(stages[0], doc! { "$unwind": "$tags" });
        assert_eq!(stages[1], doc! { "$count": "total" });
        assert_eq!(stages[2], doc! { "$skip": 5_i64 });
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = AggregationPipeline::default();
        assert!(pipeline.is_empty());
        assert!(pipeline.to_documents().is_empty());
    }
}
