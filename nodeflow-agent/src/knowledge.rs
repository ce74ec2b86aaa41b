//! Building retrieval tool descriptors from knowledge references.
//!
//! A reference either names a persistent knowledge base or points at a
//! workflow variable holding metadata of a file uploaded during the run.
//! Both end up as one [`RetrieverToolSpec`].

use std::sync::Arc;

use async_trait::async_trait;
use nodeflow_core::{context::GraphState, llm::LlmRef};
use nodeflow_tools::{
    KeywordSearchClient, KeywordStoreParams, MetadataFilter, RetrievalConfig, RetrieverToolSpec,
    VectorSearchClient, VectorStoreParams,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::{AgentError, Result},
    params::{KnowledgeKind, KnowledgeSelection, OrchestratorSettings},
    template::value_to_text,
};

/// Collections whose name starts with this prefix share storage between
/// knowledge bases and are partitioned by knowledge id.
const PARTITION_PREFIX: &str = "partition";

/// A knowledge source configured on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeReference {
    pub kind: KnowledgeKind,
    pub key: String,
}

impl KnowledgeReference {
    pub fn knowledge(key: impl Into<String>) -> Self {
        Self {
            kind: KnowledgeKind::Knowledge,
            key: key.into(),
        }
    }

    pub fn file(key: impl Into<String>) -> Self {
        Self {
            kind: KnowledgeKind::File,
            key: key.into(),
        }
    }

    /// Expand a node's knowledge selection, keeping declared order.
    pub fn from_selection(selection: &KnowledgeSelection) -> Vec<Self> {
        selection
            .value
            .iter()
            .map(|k| Self {
                kind: selection.kind,
                key: k.key.clone(),
            })
            .collect()
    }

    /// Tool name before collision handling.
    pub fn base_tool_name(&self) -> String {
        match self.kind {
            KnowledgeKind::Knowledge => format!("knowledge_{}", self.key),
            KnowledgeKind::File => {
                let stripped: String = self
                    .key
                    .chars()
                    .filter(|c| *c != '.' && *c != '#')
                    .collect();
                format!("knowledge_{stripped}")
            }
        }
    }
}

/// Persisted description of a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub collection_name: String,
    pub index_name: String,
    pub embedding_model: String,
}

/// Read-only knowledge base lookup.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn lookup_by_id(&self, id: &str) -> Result<Option<KnowledgeInfo>>;
}

/// Constructs search clients for concrete stores.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn build_vector_client(
        &self,
        params: VectorStoreParams,
    ) -> Result<Arc<dyn VectorSearchClient>>;

    async fn build_keyword_client(
        &self,
        params: KeywordStoreParams,
    ) -> Result<Arc<dyn KeywordSearchClient>>;

    /// Embedding model used for uploaded files, if one is configured.
    async fn default_embedding(&self) -> Result<Option<String>>;
}

/// Uploaded file metadata stored in workflow state.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileMetadata {
    file_id: String,
    source: String,
}

impl FileMetadata {
    fn from_value(reference: &str, value: &Value) -> Result<Self> {
        let file_id = value
            .get("file_id")
            .filter(|v| !v.is_null())
            .map(value_to_text)
            .ok_or_else(|| {
                AgentError::not_found(format!("file_id in file metadata of '{reference}'"))
            })?;
        let source = value.get("source").map(value_to_text).unwrap_or_default();
        Ok(Self { file_id, source })
    }
}

/// Turns knowledge references into retrieval tool descriptors.
#[derive(Clone)]
pub struct KnowledgeRetrieverFactory {
    store: Arc<dyn KnowledgeStore>,
    backend: Arc<dyn RetrievalBackend>,
    settings: OrchestratorSettings,
}

impl KnowledgeRetrieverFactory {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        backend: Arc<dyn RetrievalBackend>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Build the descriptor for one reference, named `name`.
    pub async fn build(
        &self,
        reference: &KnowledgeReference,
        name: String,
        state: &dyn GraphState,
        llm: &LlmRef,
        retrieval: &RetrievalConfig,
    ) -> Result<RetrieverToolSpec> {
        let (description, vector_params, keyword_params) = match reference.kind {
            KnowledgeKind::Knowledge => self.knowledge_params(&reference.key).await?,
            KnowledgeKind::File => self.file_params(&reference.key, state).await?,
        };

        debug!(
            knowledge = %reference.key,
            tool = %name,
            collection = %vector_params.collection_name,
            "Building retrieval clients"
        );

        let vector_client = self.backend.build_vector_client(vector_params).await?;
        let keyword_client = self.backend.build_keyword_client(keyword_params).await?;

        Ok(RetrieverToolSpec {
            name,
            description,
            vector_client,
            keyword_client,
            llm: Arc::clone(llm),
            retrieval: retrieval.clone(),
        })
    }

    async fn knowledge_params(
        &self,
        knowledge_id: &str,
    ) -> Result<(String, VectorStoreParams, KeywordStoreParams)> {
        let info = self
            .store
            .lookup_by_id(knowledge_id)
            .await?
            .ok_or_else(|| AgentError::not_found(format!("knowledge {knowledge_id}")))?;

        let partition_key = info
            .collection_name
            .starts_with(PARTITION_PREFIX)
            .then(|| info.id.clone());

        let vector = VectorStoreParams {
            collection_name: info.collection_name.clone(),
            embedding_model: info.embedding_model.clone(),
            partition_key,
            metadata_filter: None,
        };
        let keyword = KeywordStoreParams {
            index_name: info.index_name.clone(),
            post_filter: None,
        };
        Ok((
            format!("{}:{}", info.name, info.description),
            vector,
            keyword,
        ))
    }

    async fn file_params(
        &self,
        reference: &str,
        state: &dyn GraphState,
    ) -> Result<(String, VectorStoreParams, KeywordStoreParams)> {
        let metadata = FileMetadata::from_value(reference, &state.get_variable(reference)?)?;

        let embedding_model = self.backend.default_embedding().await?.ok_or_else(|| {
            AgentError::configuration("no default embedding model is configured")
        })?;

        let vector = VectorStoreParams {
            collection_name: self.settings.tmp_collection_name.clone(),
            embedding_model,
            partition_key: Some(self.settings.workflow_id.clone()),
            metadata_filter: Some(MetadataFilter::field_in(
                "file_id",
                vec![metadata.file_id.clone()],
            )),
        };
        let keyword = KeywordStoreParams {
            index_name: self.settings.tmp_collection_name.clone(),
            post_filter: Some(json!({
                "terms": {"metadata.file_id": [metadata.file_id]}
            })),
        };
        Ok((format!("file name: {}", metadata.source), vector, keyword))
    }
}

impl std::fmt::Debug for KnowledgeRetrieverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeRetrieverFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use nodeflow_core::context::{Context, ContextBuilder};
    use nodeflow_tools::RetrievedChunk;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::StaticModel;

    #[derive(Default)]
    pub(crate) struct MemoryKnowledgeStore {
        pub entries: HashMap<String, KnowledgeInfo>,
    }

    impl MemoryKnowledgeStore {
        pub(crate) fn with(mut self, info: KnowledgeInfo) -> Self {
            self.entries.insert(info.id.clone(), info);
            self
        }
    }

    #[async_trait]
    impl KnowledgeStore for MemoryKnowledgeStore {
        async fn lookup_by_id(&self, id: &str) -> Result<Option<KnowledgeInfo>> {
            Ok(self.entries.get(id).cloned())
        }
    }

    pub(crate) fn knowledge_info(id: &str, collection: &str) -> KnowledgeInfo {
        KnowledgeInfo {
            id: id.to_string(),
            name: format!("kb{id}"),
            description: "quarterly reports".to_string(),
            collection_name: collection.to_string(),
            index_name: format!("index_{id}"),
            embedding_model: "embed-small".to_string(),
        }
    }

    #[derive(Debug)]
    pub(crate) struct RecordedVector(pub VectorStoreParams);

    #[async_trait]
    impl VectorSearchClient for RecordedVector {
        fn params(&self) -> &VectorStoreParams {
            &self.0
        }

        async fn search(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> nodeflow_tools::Result<Vec<RetrievedChunk>> {
            Ok(vec![])
        }
    }

    #[derive(Debug)]
    pub(crate) struct RecordedKeyword(pub KeywordStoreParams);

    #[async_trait]
    impl KeywordSearchClient for RecordedKeyword {
        fn params(&self) -> &KeywordStoreParams {
            &self.0
        }

        async fn search(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> nodeflow_tools::Result<Vec<RetrievedChunk>> {
            Ok(vec![])
        }
    }

    /// Backend that records every client it builds.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub embedding: Option<String>,
        pub built: AtomicUsize,
        pub vector_params: Mutex<Vec<VectorStoreParams>>,
    }

    impl RecordingBackend {
        pub(crate) fn with_embedding(embedding: &str) -> Self {
            Self {
                embedding: Some(embedding.to_string()),
                ..Default::default()
            }
        }

        pub(crate) fn built(&self) -> usize {
            self.built.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RetrievalBackend for RecordingBackend {
        async fn build_vector_client(
            &self,
            params: VectorStoreParams,
        ) -> Result<Arc<dyn VectorSearchClient>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut recorded) = self.vector_params.lock() {
                recorded.push(params.clone());
            }
            Ok(Arc::new(RecordedVector(params)))
        }

        async fn build_keyword_client(
            &self,
            params: KeywordStoreParams,
        ) -> Result<Arc<dyn KeywordSearchClient>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordedKeyword(params)))
        }

        async fn default_embedding(&self) -> Result<Option<String>> {
            Ok(self.embedding.clone())
        }
    }

    fn factory(
        store: MemoryKnowledgeStore,
        backend: RecordingBackend,
    ) -> KnowledgeRetrieverFactory {
        KnowledgeRetrieverFactory::new(
            Arc::new(store),
            Arc::new(backend),
            OrchestratorSettings::new("wf-9"),
        )
    }

    fn llm() -> LlmRef {
        Arc::new(StaticModel::new("1"))
    }

    #[test]
    fn test_base_tool_names() {
        assert_eq!(
            KnowledgeReference::knowledge("42").base_tool_name(),
            "knowledge_42"
        );
        assert_eq!(
            KnowledgeReference::file("node7.file#0").base_tool_name(),
            "knowledge_node7file0"
        );
    }

    #[tokio::test]
    async fn test_knowledge_base_spec() {
        let store = MemoryKnowledgeStore::default().with(knowledge_info("42", "col_a"));
        let factory = factory(store, RecordingBackend::default());
        let reference = KnowledgeReference::knowledge("42");

        let spec = factory
            .build(
                &reference,
                reference.base_tool_name(),
                &Context::new(),
                &llm(),
                &RetrievalConfig::new(500, true),
            )
            .await
            .unwrap();

        assert_eq!(spec.name, "knowledge_42");
        assert_eq!(spec.description, "kb42:quarterly reports");
        assert_eq!(spec.retrieval, RetrievalConfig::new(500, true));
        assert_eq!(
            spec.vector_client.params(),
            &VectorStoreParams {
                collection_name: "col_a".into(),
                embedding_model: "embed-small".into(),
                partition_key: None,
                metadata_filter: None,
            }
        );
        assert_eq!(spec.keyword_client.params().index_name, "index_42");
        assert!(spec.keyword_client.params().post_filter.is_none());
    }

    #[tokio::test]
    async fn test_partitioned_collection_uses_knowledge_id() {
        let store =
            MemoryKnowledgeStore::default().with(knowledge_info("42", "partition_shared"));
        let factory = factory(store, RecordingBackend::default());
        let reference = KnowledgeReference::knowledge("42");

        let spec = factory
            .build(
                &reference,
                reference.base_tool_name(),
                &Context::new(),
                &llm(),
                &RetrievalConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            spec.vector_client.params().partition_key.as_deref(),
            Some("42")
        );
    }

    #[tokio::test]
    async fn test_unknown_knowledge() {
        let factory = factory(MemoryKnowledgeStore::default(), RecordingBackend::default());
        let reference = KnowledgeReference::knowledge("404");

        let err = factory
            .build(
                &reference,
                reference.base_tool_name(),
                &Context::new(),
                &llm(),
                &RetrievalConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound(m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_file_spec() {
        let state = ContextBuilder::new()
            .with_variable("node7", "file", json!({"file_id": "f1", "source": "report.pdf"}))
            .unwrap()
            .build();
        let factory = factory(
            MemoryKnowledgeStore::default(),
            RecordingBackend::with_embedding("embed-default"),
        );
        let reference = KnowledgeReference::file("node7.file");

        let spec = factory
            .build(
                &reference,
                reference.base_tool_name(),
                &state,
                &llm(),
                &RetrievalConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(spec.name, "knowledge_node7file");
        assert!(spec.description.contains("report.pdf"));

        let vector = spec.vector_client.params();
        assert_eq!(vector.collection_name, "tmp_workflow_data");
        assert_eq!(vector.embedding_model, "embed-default");
        assert_eq!(vector.partition_key.as_deref(), Some("wf-9"));
        assert_eq!(
            vector.metadata_filter.as_ref().map(|f| f.to_string()),
            Some(r#"file_id in ["f1"]"#.to_string())
        );

        let keyword = spec.keyword_client.params();
        assert_eq!(keyword.index_name, "tmp_workflow_data");
        assert_eq!(
            keyword.post_filter,
            Some(json!({"terms": {"metadata.file_id": ["f1"]}}))
        );
    }

    #[tokio::test]
    async fn test_file_without_default_embedding() {
        let state = ContextBuilder::new()
            .with_variable("node7", "file", json!({"file_id": "f1", "source": "a.pdf"}))
            .unwrap()
            .build();
        let backend = RecordingBackend::default();
        let factory = factory(MemoryKnowledgeStore::default(), backend);
        let reference = KnowledgeReference::file("node7.file");

        let err = factory
            .build(
                &reference,
                reference.base_tool_name(),
                &state,
                &llm(),
                &RetrievalConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_file_metadata_without_id() {
        let state = ContextBuilder::new()
            .with_variable("node7", "file", json!({"source": "a.pdf"}))
            .unwrap()
            .build();
        let factory = factory(
            MemoryKnowledgeStore::default(),
            RecordingBackend::with_embedding("e"),
        );
        let reference = KnowledgeReference::file("node7.file");

        let err = factory
            .build(
                &reference,
                reference.base_tool_name(),
                &state,
                &llm(),
                &RetrievalConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound(m) if m.contains("node7.file")));
    }
}
