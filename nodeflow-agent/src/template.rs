//! Prompt templates with `{node_id.key}` variable references.
//!
//! A reference is `node_id.key`, optionally followed by a list index as in
//! `node_id.key#2`. Literal braces, such as a JSON example in a prompt, are
//! written `{{` and `}}`: `Reply as {{"answer": 4}}`. A single-braced span
//! that is not a reference, or an unbalanced brace, is rejected at parse
//! time with the byte offset of the offending brace.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Matches, in priority order: escaped braces, a reference, a lone brace.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("template token pattern is valid")
});

/// `node_id.key` with an optional `#index` suffix.
static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s.#]+\.[^\s#]+(#\d+)?$").expect("reference pattern is valid")
});

/// Values substituted into a template, keyed by the exact reference text.
pub type VariableMap = HashMap<String, Value>;

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    raw: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template, collecting distinct references in first-seen order.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let raw = text.into();
        let mut segments = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut cursor = 0;

        for captures in TOKEN_PATTERN.captures_iter(&raw) {
            let Some(token) = captures.get(0) else {
                continue;
            };
            literal.push_str(&raw[cursor..token.start()]);
            cursor = token.end();

            match (token.as_str(), captures.get(1)) {
                ("{{", _) => literal.push('{'),
                ("}}", _) => literal.push('}'),
                (_, Some(reference)) => {
                    let reference = reference.as_str().trim();
                    if reference.is_empty() {
                        return Err(AgentError::template(token.start(), "empty reference"));
                    }
                    if !REFERENCE_PATTERN.is_match(reference) {
                        return Err(AgentError::template(
                            token.start(),
                            format!("invalid reference '{reference}', expected node_id.key"),
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if !variables.iter().any(|v| v == reference) {
                        variables.push(reference.to_string());
                    }
                    segments.push(Segment::Variable(reference.to_string()));
                }
                ("{", None) => {
                    return Err(AgentError::template(
                        token.start(),
                        "unterminated reference",
                    ));
                }
                _ => {
                    return Err(AgentError::template(
                        token.start(),
                        "unmatched closing brace",
                    ));
                }
            }
        }

        literal.push_str(&raw[cursor..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw,
            segments,
            variables,
        })
    }

    /// The template text as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Distinct references in first-seen order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.variables.iter().any(|v| v == reference)
    }

    /// Substitute every reference with its value from `values`.
    pub fn render(&self, values: &VariableMap) -> Result<String> {
        let mut rendered = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Variable(reference) => {
                    let value = values
                        .get(reference)
                        .ok_or_else(|| AgentError::missing_variable(reference))?;
                    rendered.push_str(&value_to_text(value));
                }
            }
        }
        Ok(rendered)
    }
}

/// Text form of a state value inside a prompt.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
