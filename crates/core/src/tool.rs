//! Tool trait: the abstraction over report-building capabilities.
//!
//! Tools are what give the model access to the document collection:
//! extract text for a section, look up figures and tables, summarize.
//! Each tool declares a schema of named string parameters (some optional
//! with defaults) and the shape of what it returns.

use async_trait::async_trait;
use tracing::debug;

use crate::document::ContentBlock;
use crate::error::ToolError;
use crate::message::{ToolArgs, ToolPayload, ToolRequest};
use crate::model::ToolDefinition;

/// One named string parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    /// `None` = required; `Some` = optional with this default.
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: Some(default.into()),
        }
    }
}

/// What a tool promises to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Text,
    Blocks,
}

/// The value a tool handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl ToolOutput {
    pub fn shape(&self) -> ReturnShape {
        match self {
            Self::Text(_) => ReturnShape::Text,
            Self::Blocks(_) => ReturnShape::Blocks,
        }
    }
}

impl From<ToolOutput> for ToolPayload {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(text) => ToolPayload::Text(text),
            ToolOutput::Blocks(blocks) => ToolPayload::Blocks(blocks),
        }
    }
}

/// The core Tool trait.
///
/// Handlers receive arguments already checked against [`Tool::parameters`]
/// with defaults filled in. Content-level failures (nothing retrieved, a
/// backend hiccup) are reported as ordinary output text; an `Err` is reserved
/// for faults the tool cannot describe as content.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "extract_exact_text").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Declared parameters.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Declared return shape.
    fn returns(&self) -> ReturnShape;

    /// Execute the tool with validated arguments.
    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError>;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value {
        let params = self.parameters();
        let mut properties = serde_json::Map::new();
        for p in &params {
            let mut prop = serde_json::json!({
                "type": "string",
                "description": p.description,
            });
            if let Some(default) = &p.default {
                prop["default"] = serde_json::json!(default);
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = params
            .iter()
            .filter(|p| p.default.is_none())
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The fixed set of tools available to one orchestrator.
///
/// Built once at startup and shared immutably. Registration order is kept so
/// tool definitions reach the model in a stable order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool request: look up, validate against the schema, run,
    /// and check the declared return shape.
    pub async fn execute(&self, request: &ToolRequest) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(&request.tool_name)
            .ok_or_else(|| ToolError::NotFound(request.tool_name.clone()))?;

        let args = validate_args(tool, &request.args)?;
        let output = tool.execute(&args).await?;

        if output.shape() != tool.returns() {
            return Err(ToolError::ExecutionFailed {
                tool_name: tool.name().to_string(),
                reason: format!(
                    "returned {:?} but declares {:?}",
                    output.shape(),
                    tool.returns()
                ),
            });
        }

        Ok(output)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `given` against the tool's parameters and fill in defaults.
fn validate_args(tool: &dyn Tool, given: &ToolArgs) -> Result<ToolArgs, ToolError> {
    let params = tool.parameters();
    let mut args = ToolArgs::new();

    for param in &params {
        match (given.get(&param.name), &param.default) {
            (Some(value), _) => {
                args.insert(param.name.clone(), value.clone());
            }
            (None, Some(default)) => {
                args.insert(param.name.clone(), default.clone());
            }
            (None, None) => {
                return Err(ToolError::InvalidArguments(format!(
                    "{} requires '{}'",
                    tool.name(),
                    param.name
                )));
            }
        }
    }

    for key in given.keys() {
        if !params.iter().any(|p| &p.name == key) {
            debug!(tool = tool.name(), argument = %key, "Ignoring undeclared tool argument");
        }
    }

    Ok(args)
}
