//! Retrieval clients and the knowledge retrieval tool.
//!
//! A retrieval tool wraps one vector search client and one keyword search
//! client. Concrete stores live outside nodeflow and plug in through
//! [`VectorSearchClient`] and [`KeywordSearchClient`].

use std::{collections::HashSet, fmt, sync::Arc};

use async_trait::async_trait;
use nodeflow_core::llm::LlmRef;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    core::{Tool, ToolCapability, ToolCategory, ToolContext, ToolParameters, ToolResult},
    error::{Result, ToolError},
};

/// Default number of chunks requested from each backend.
pub const DEFAULT_TOP_K: usize = 4;

/// Retrieval options shared by every knowledge tool of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Upper bound on the characters returned to the model
    pub max_content: usize,
    /// Order chunks by source then chunk index instead of relevance
    pub sort_by_source_and_index: bool,
}

impl RetrievalConfig {
    pub fn new(max_content: usize, sort_by_source_and_index: bool) -> Self {
        Self {
            max_content,
            sort_by_source_and_index,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_content: 15000,
            sort_by_source_and_index: false,
        }
    }
}

/// Metadata restriction applied by a vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataFilter {
    /// Field value must be one of `values`
    In { field: String, values: Vec<String> },
}

impl MetadataFilter {
    pub fn field_in(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    /// Check a chunk's metadata against the filter.
    pub fn matches(&self, metadata: &Value) -> bool {
        match self {
            Self::In { field, values } => metadata
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|v| values.iter().any(|allowed| allowed == v)),
        }
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In { field, values } => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                write!(f, "{field} in [{}]", quoted.join(", "))
            }
        }
    }
}

/// Scope of a vector search client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorStoreParams {
    pub collection_name: String,
    pub embedding_model: String,
    pub partition_key: Option<String>,
    pub metadata_filter: Option<MetadataFilter>,
}

/// Scope of a keyword search client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeywordStoreParams {
    pub index_name: String,
    pub post_filter: Option<Value>,
}

/// One chunk returned by a search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: Value,
}

impl RetrievedChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            chunk_index,
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Similarity search over an embedding collection.
#[async_trait]
pub trait VectorSearchClient: Send + Sync + fmt::Debug {
    fn params(&self) -> &VectorStoreParams;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Full-text search over a keyword index.
#[async_trait]
pub trait KeywordSearchClient: Send + Sync + fmt::Debug {
    fn params(&self) -> &KeywordStoreParams;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Uniform descriptor from which a retrieval tool is built, whatever the
/// knowledge backend behind it.
#[derive(Debug, Clone)]
pub struct RetrieverToolSpec {
    pub name: String,
    pub description: String,
    pub vector_client: Arc<dyn VectorSearchClient>,
    pub keyword_client: Arc<dyn KeywordSearchClient>,
    pub llm: LlmRef,
    pub retrieval: RetrievalConfig,
}

/// Tool answering a query with chunks from both retrieval backends.
#[derive(Debug)]
pub struct KnowledgeRetrievalTool {
    spec: RetrieverToolSpec,
}

impl KnowledgeRetrievalTool {
    pub fn new(spec: RetrieverToolSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &RetrieverToolSpec {
        &self.spec
    }

    /// Query both backends and merge their chunks.
    ///
    /// A backend failure comes back as [`ToolError::Retrieval`] naming the
    /// backend that failed.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let vector_hits = self
            .spec
            .vector_client
            .search(query, DEFAULT_TOP_K)
            .await
            .map_err(|e| backend_error("vector", e))?;
        let keyword_hits = self
            .spec
            .keyword_client
            .search(query, DEFAULT_TOP_K)
            .await
            .map_err(|e| backend_error("keyword", e))?;

        let mut seen = HashSet::new();
        let mut merged: Vec<RetrievedChunk> = vector_hits
            .into_iter()
            .chain(keyword_hits)
            .filter(|chunk| seen.insert(chunk.content.clone()))
            .collect();

        if self.spec.retrieval.sort_by_source_and_index {
            merged.sort_by(|a, b| {
                a.source
                    .cmp(&b.source)
                    .then(a.chunk_index.cmp(&b.chunk_index))
            });
        }

        debug!(
            tool = %self.spec.name,
            chunks = merged.len(),
            "Retrieved knowledge chunks"
        );
        Ok(merged)
    }

    /// Join chunks into model context, bounded by `max_content` characters.
    pub fn format_chunks(&self, chunks: &[RetrievedChunk]) -> String {
        let joined = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        joined.chars().take(self.spec.retrieval.max_content).collect()
    }
}

fn backend_error(backend: &str, err: ToolError) -> ToolError {
    match err {
        ToolError::Retrieval { .. } => err,
        other => ToolError::retrieval(backend, other.to_string()),
    }
}

#[async_trait]
impl Tool for KnowledgeRetrievalTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Knowledge
    }

    fn parameter_schema(&self) -> Value {
        ToolParameters::new_schema()
            .add_required("query", "string", "Question to search the knowledge for")
            .into()
    }

    async fn execute(&self, parameters: ToolParameters, context: ToolContext) -> Result<ToolResult> {
        let query = parameters.get_string("query")?;
        debug!(tool = %self.spec.name, session = %context.session_id, "Searching knowledge");
        let chunks = self.retrieve(&query).await?;

        Ok(ToolResult::success(self.format_chunks(&chunks))
            .with_metadata("chunk_count", json!(chunks.len())))
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![
            ToolCapability::Basic,
            ToolCapability::ReadOnly,
            ToolCapability::NetworkRequired,
        ]
    }
}
