//! Document and snapshot types.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single fetched source item, or a placeholder for one that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    /// Source item id the document was fetched for.
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Last error seen when the item could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: BTreeMap::new(), fetch_error: None }
    }

    /// Stand-in for a source item that could not be retrieved. Keeps the id
    /// so counts and ordering stay stable downstream.
    pub fn placeholder(id: impl Into<String>, error: impl Into<String>) -> Self {
        let id = id.into();
        let mut metadata = BTreeMap::new();
        metadata.insert("source_id".to_string(), id.clone());
        Self { id, text: String::new(), metadata, fetch_error: Some(error.into()) }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.fetch_error.is_some()
    }

    /// Whether the document carries text worth indexing.
    pub fn is_indexable(&self) -> bool {
        !self.is_placeholder() && !self.text.trim().is_empty()
    }
}

/// Ordered documents produced by one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentSnapshot {
    pub documents: Vec<Document>,
}

impl DocumentSnapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_placeholder()).count()
    }

    pub fn indexable(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| d.is_indexable())
    }
}

impl From<Vec<Document>> for DocumentSnapshot {
    fn from(documents: Vec<Document>) -> Self {
        Self::new(documents)
    }
}
