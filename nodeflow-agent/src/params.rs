//! Node configuration as authored in the workflow editor, plus the
//! settings an engine supplies when it hosts agent nodes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AgentError, Result};

/// Default collection and index holding files uploaded during a workflow.
pub const DEFAULT_TMP_COLLECTION: &str = "tmp_workflow_data";

/// Output key used in single mode.
pub const SINGLE_OUTPUT_KEY: &str = "output";

fn default_temperature() -> f32 {
    0.3
}

fn default_history_depth() -> usize {
    10
}

/// Identifiers arrive as numbers or strings depending on the editor version.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Str(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(id) => id.to_string(),
        RawId::Str(id) => id,
    })
}

/// Agent node parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub chat_history_flag: ChatHistoryFlag,
    #[serde(deserialize_with = "deserialize_id")]
    pub model_id: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Stream the answer to the end user and record it in the chat transcript
    #[serde(default)]
    pub output_user: bool,
    #[serde(default)]
    pub tool_list: Vec<ToolRef>,
    #[serde(default)]
    pub knowledge_id: KnowledgeSelection,
    #[serde(default)]
    pub tab: TabSelection,
    /// Variable references consumed one per output in batch mode
    #[serde(default)]
    pub batch_variable: Vec<String>,
    #[serde(default)]
    pub output: Vec<OutputRef>,
}

impl NodeParams {
    /// Minimal single-mode parameters for the given model.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            system_prompt: String::new(),
            user_prompt: String::new(),
            chat_history_flag: ChatHistoryFlag::default(),
            model_id: model_id.into(),
            temperature: default_temperature(),
            output_user: false,
            tool_list: Vec::new(),
            knowledge_id: KnowledgeSelection::default(),
            tab: TabSelection::default(),
            batch_variable: Vec::new(),
            output: Vec::new(),
        }
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        self.system_prompt = system_prompt.into();
        self.user_prompt = user_prompt.into();
        self
    }

    pub fn with_history(mut self, depth: usize) -> Self {
        self.chat_history_flag = ChatHistoryFlag {
            flag: true,
            value: depth,
        };
        self
    }

    pub fn with_output_user(mut self, output_user: bool) -> Self {
        self.output_user = output_user;
        self
    }

    pub fn with_tools(mut self, tool_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tool_list = tool_ids
            .into_iter()
            .map(|key| ToolRef { key: key.into() })
            .collect();
        self
    }

    pub fn with_knowledge(
        mut self,
        kind: KnowledgeKind,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.knowledge_id = KnowledgeSelection {
            kind,
            value: keys
                .into_iter()
                .map(|key| KnowledgeKey { key: key.into() })
                .collect(),
        };
        self
    }

    /// Switch to batch mode with `(input_ref, output_key)` pairs.
    pub fn with_batch<I, A, B>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.tab = TabSelection {
            value: ExecutionMode::Batch,
        };
        self.batch_variable.clear();
        self.output.clear();
        for (input, key) in items {
            self.batch_variable.push(input.into());
            self.output.push(OutputRef { key: key.into() });
        }
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.tab.value
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.tool_list.iter().map(|t| t.key.clone()).collect()
    }

    /// Pair batch inputs with output keys, in declared order.
    pub fn batch_items(&self) -> Result<Vec<BatchItem>> {
        if self.batch_variable.len() != self.output.len() {
            return Err(AgentError::configuration(format!(
                "batch mode declares {} batch variables but {} outputs",
                self.batch_variable.len(),
                self.output.len()
            )));
        }
        if self.batch_variable.is_empty() {
            return Err(AgentError::configuration(
                "batch mode requires at least one batch variable",
            ));
        }
        Ok(self
            .batch_variable
            .iter()
            .zip(&self.output)
            .map(|(input_ref, output)| BatchItem {
                input_ref: input_ref.clone(),
                output_key: output.key.clone(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryFlag {
    #[serde(default)]
    pub flag: bool,
    #[serde(default = "default_history_depth")]
    pub value: usize,
}

impl Default for ChatHistoryFlag {
    fn default() -> Self {
        Self {
            flag: false,
            value: default_history_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeKey {
    #[serde(deserialize_with = "deserialize_id")]
    pub key: String,
}

/// Backend a knowledge reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeKind {
    /// Persistent knowledge base, keyed by its id
    #[default]
    Knowledge,
    /// Files uploaded during the workflow, keyed by a state variable
    #[serde(alias = "tmp")]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KnowledgeSelection {
    #[serde(rename = "type", default)]
    pub kind: KnowledgeKind,
    #[serde(default)]
    pub value: Vec<KnowledgeKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Single,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabSelection {
    pub value: ExecutionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    pub key: String,
}

/// One batch input and the output key it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub input_ref: String,
    pub output_key: String,
}

/// Engine-level settings shared by every agent node of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Collection and index that hold files uploaded during the workflow
    pub tmp_collection_name: String,
    /// Id of the running workflow, the partition of its uploaded files
    pub workflow_id: String,
    /// Upper bound on requested history depth
    pub max_history: usize,
}

impl OrchestratorSettings {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Self::default()
        }
    }

    pub fn with_tmp_collection(mut self, name: impl Into<String>) -> Self {
        self.tmp_collection_name = name.into();
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            tmp_collection_name: DEFAULT_TMP_COLLECTION.to_string(),
            workflow_id: String::new(),
            max_history: 50,
        }
    }
}
