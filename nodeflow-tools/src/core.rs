use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::error::{Result, ToolError};

/// A callable tool handed to an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identifier the model calls the tool by
    fn name(&self) -> &str;

    /// Text shown to the model when it picks a tool
    fn description(&self) -> &str;

    fn category(&self) -> ToolCategory;

    /// JSON schema of the call arguments
    fn parameter_schema(&self) -> Value;

    async fn execute(&self, parameters: ToolParameters, context: ToolContext)
    -> Result<ToolResult>;

    /// Check arguments against [`Tool::parameter_schema`].
    async fn validate_parameters(&self, parameters: &ToolParameters) -> Result<()> {
        let schema = self.parameter_schema();
        let validator = jsonschema::Validator::new(&schema)
            .map_err(|e| ToolError::validation(format!("Invalid schema: {e}")))?;

        validator
            .validate(parameters.inner())
            .map_err(|e| ToolError::validation(format!("Parameter validation failed: {e}")))
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::Basic]
    }
}

/// Where a tool comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Selected by id in the node's tool list
    Function,
    /// Built from a knowledge base or an uploaded file
    Knowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    Basic,
    /// Calls a remote service
    NetworkRequired,
    /// Never mutates anything
    ReadOnly,
}

/// Call arguments, also used to build argument schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    inner: Value,
}

impl ToolParameters {
    pub fn new(value: Value) -> Self {
        Self { inner: value }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// An object schema with no properties yet.
    pub fn new_schema() -> Self {
        Self::new(json!({"type": "object", "properties": {}, "required": []}))
    }

    pub fn inner(&self) -> &Value {
        &self.inner
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .inner
            .get(key)
            .ok_or_else(|| ToolError::invalid_field(key, "Parameter not found"))?;
        serde_json::from_value(value.clone())
            .map_err(|_| ToolError::invalid_field(key, "Invalid parameter type"))
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Add a required property to a schema built with [`Self::new_schema`].
    pub fn add_required(mut self, name: &str, param_type: &str, description: &str) -> Self {
        if !self.inner.is_object() {
            self = Self::new_schema();
        }
        self.inner["properties"][name] = json!({"type": param_type, "description": description});

        let required = &mut self.inner["required"];
        if !required.is_array() {
            *required = json!([]);
        }
        if let Some(names) = required.as_array_mut()
            && !names.iter().any(|n| n == name)
        {
            names.push(json!(name));
        }
        self
    }
}

impl From<Value> for ToolParameters {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<ToolParameters> for Value {
    fn from(params: ToolParameters) -> Self {
        params.inner
    }
}

/// Per-call context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub session_id: Uuid,
}

impl ToolContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a tool call. The content is what the model reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            metadata: HashMap::new(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            metadata: HashMap::new(),
            error: Some(message.into()),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn get_metadata<T>(&self, key: &str) -> Option<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.metadata
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// What a tool looks like to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameter_schema: Value,
}

impl ToolInfo {
    pub fn new(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            category: tool.category(),
            parameter_schema: tool.parameter_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_schema_builder() {
        let schema: Value = ToolParameters::new_schema()
            .add_required("query", "string", "Search query")
            .add_required("query", "string", "Search query")
            .into();

        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {"query": {"type": "string", "description": "Search query"}},
                "required": ["query"]
            })
        );
    }

    #[test]
    fn test_parameter_access() {
        let params = ToolParameters::new(json!({"query": "revenue", "top_k": "four"}));

        assert_eq!(params.get_string("query").unwrap(), "revenue");
        assert!(matches!(
            params.get::<String>("missing"),
            Err(ToolError::InvalidField { .. })
        ));
        assert!(matches!(
            params.get::<u32>("top_k"),
            Err(ToolError::InvalidField { field, .. }) if field == "top_k"
        ));
    }

    #[test]
    fn test_tool_result() {
        let result = ToolResult::success("done").with_metadata("hits", json!(3));
        assert!(result.is_success());
        assert_eq!(result.get_metadata::<u32>("hits"), Some(3));

        let failed = ToolResult::error("boom");
        assert!(!failed.is_success());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"success": false, "content": "", "error": "boom"})
        );
    }
}
