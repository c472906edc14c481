//! Tool trait, catalog, and executor.
//!
//! Tools give the agent the ability to act on the workspace. Each tool declares
//! a typed argument schema; the catalog validates a call against it before any
//! side effect happens, and the executor turns every outcome into a uniform
//! `ToolCallResult`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::turn::{ToolCallRequest, ToolCallResult};
use crate::workspace::Workspace;

/// The JSON type a tool argument must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ArgType {
    pub fn json_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

fn describe(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgField {
    pub name: String,
    pub kind: ArgType,
    pub required: bool,
    pub description: String,
}

/// Declaration of one invocable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub fields: Vec<ArgField>,
    /// Safe to repeat with the same arguments.
    pub idempotent: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
            idempotent: false,
        }
    }

    pub fn required(mut self, name: &str, kind: ArgType, description: &str) -> Self {
        self.fields.push(ArgField {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        });
        self
    }

    pub fn optional(mut self, name: &str, kind: ArgType, description: &str) -> Self {
        self.fields.push(ArgField {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        });
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// JSON Schema for the argument object.
    pub fn json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    serde_json::json!({
                        "type": f.kind.json_name(),
                        "description": f.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.json_schema(),
        }
    }

    /// Check `arguments` against the declared fields.
    ///
    /// `null` is accepted as an empty argument object.
    pub fn validate(&self, arguments: &serde_json::Value) -> Result<ToolArgs, ToolError> {
        let map = match arguments {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(ToolError::schema(
                    "arguments",
                    format!("expected an object, got {}", describe(other)),
                ));
            }
        };

        for key in map.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(ToolError::schema(key, "unknown field"));
            }
        }

        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(serde_json::Value::Null) if field.required => {
                    return Err(ToolError::schema(&field.name, "required field is missing"));
                }
                None | Some(serde_json::Value::Null) => {}
                Some(value) if !field.kind.matches(value) => {
                    return Err(ToolError::schema(
                        &field.name,
                        format!(
                            "expected {}, got {}",
                            field.kind.json_name(),
                            describe(value)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(ToolArgs(map))
    }
}

/// Validated tool arguments with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(serde_json::Map<String, serde_json::Value>);

impl ToolArgs {
    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.opt_str(name)
            .ok_or_else(|| ToolError::schema(name, "required field is missing"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn opt_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(|v| v.as_bool())
    }

    pub fn opt_u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(|v| v.as_u64())
    }
}

/// The core Tool trait.
///
/// Each tool (read_file, write_file, git_commit, ...) implements this trait and
/// is registered in the `ToolCatalog`. Adding a tool is a registration, not a
/// new branch in the loop.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Perform the effect. Only ever called with arguments that passed `spec().validate()`.
    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError>;
}

/// A call that passed validation and is ready to execute.
pub struct ValidatedCall<'a> {
    pub tool: &'a dyn Tool,
    pub args: ToolArgs,
}

/// The fixed set of tools a run may invoke.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Validate requested calls before dispatch
#[derive(Default, Clone)]
pub struct ToolCatalog {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.get(name).map(|t| t.spec())
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.spec().to_definition()).collect()
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve and validate a call. No side effects.
    pub fn validate(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ValidatedCall<'_>, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = tool.spec().validate(arguments)?;
        Ok(ValidatedCall { tool, args })
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names())
            .finish()
    }
}

/// Executes validated calls against the workspace collaborators.
///
/// Holds no per-run state; every side effect lands in the workspace.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    workspace: Workspace,
}

impl ToolExecutor {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Execute a validated call. Tool failures become `error` results.
    pub async fn execute(&self, call_id: &str, call: ValidatedCall<'_>) -> ToolCallResult {
        let name = call.tool.name().to_string();
        match call.tool.execute(&call.args, &self.workspace).await {
            Ok(payload) => ToolCallResult::ok(call_id, payload),
            Err(e) => {
                debug!(tool = %name, call_id, error = %e, "Tool returned an error");
                ToolCallResult::error(call_id, e.to_string())
            }
        }
    }

    /// Validate then execute; validation failures never reach the tool.
    pub async fn run(&self, catalog: &ToolCatalog, request: &ToolCallRequest) -> ToolCallResult {
        match catalog.validate(&request.name, &request.arguments) {
            Ok(call) => self.execute(&request.id, call).await,
            Err(e) => {
                warn!(call_id = %request.id, tool = %request.name, error = %e, "Rejected tool call");
                ToolCallResult::error(&request.id, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkspaceError;
    use crate::workspace::{CommandOutput, CommandSandbox, DirEntry, FileStore, Vcs, VcsStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A simple test tool for unit tests.
    struct EchoTool {
        spec: ToolSpec,
        calls: AtomicUsize,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                spec: ToolSpec::new("echo", "Echoes back the input")
                    .required("text", ArgType::String, "Text to echo")
                    .optional("times", ArgType::Integer, "Repeat count")
                    .idempotent(true),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(
            &self,
            args: &ToolArgs,
            _workspace: &Workspace,
        ) -> Result<serde_json::Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = args.str("text")?;
            if text == "fail" {
                return Err(WorkspaceError::NotFound("fail".into()).into());
            }
            let times = args.opt_u64("times").unwrap_or(1) as usize;
            Ok(serde_json::json!(text.repeat(times)))
        }
    }

    struct Nothing;

    #[async_trait]
    impl FileStore for Nothing {
        async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceError> {
            Err(WorkspaceError::NotFound(path.into()))
        }
        async fn write(&self, _: &str, _: &[u8]) -> Result<(), WorkspaceError> {
            Ok(())
        }
        async fn list(&self, _: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
            Ok(vec![])
        }
        async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
            Err(WorkspaceError::NotFound(path.into()))
        }
    }

    #[async_trait]
    impl Vcs for Nothing {
        async fn status(&self) -> Result<VcsStatus, WorkspaceError> {
            Err(WorkspaceError::NotInitialized)
        }
        async fn stage_all(&self) -> Result<(), WorkspaceError> {
            Err(WorkspaceError::NotInitialized)
        }
        async fn commit(&self, _: &str) -> Result<String, WorkspaceError> {
            Err(WorkspaceError::NotInitialized)
        }
    }

    #[async_trait]
    impl CommandSandbox for Nothing {
        async fn run(&self, _: &str) -> Result<CommandOutput, WorkspaceError> {
            Err(WorkspaceError::Timeout { timeout_secs: 1 })
        }
    }

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(Nothing), Arc::new(Nothing), Arc::new(Nothing))
    }

    fn catalog_with(tool: Arc<EchoTool>) -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        catalog.register(tool);
        catalog
    }

    #[test]
    fn catalog_register_and_lookup() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("nonexistent").is_none());
        assert_eq!(catalog.names(), vec!["echo"]);
    }

    #[test]
    fn definitions_carry_json_schema() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let defs = catalog.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].parameters["required"], serde_json::json!(["text"]));
        assert_eq!(defs[0].parameters["properties"]["times"]["type"], "integer");
    }

    #[test]
    fn unknown_tool_rejected() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let err = catalog
            .validate("rm_rf", &serde_json::json!({}))
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "rm_rf"));
    }

    #[test]
    fn missing_required_field_rejected() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let err = catalog.validate("echo", &serde_json::json!({})).err().unwrap();
        match err {
            ToolError::SchemaViolation { field, .. } => assert_eq!(field, "text"),
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn wrong_type_rejected() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let err = catalog
            .validate("echo", &serde_json::json!({"text": "a", "times": "two"}))
            .err()
            .unwrap();
        assert!(err.to_string().contains("expected integer, got string"));
    }

    #[test]
    fn unknown_field_rejected() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let err = catalog
            .validate("echo", &serde_json::json!({"text": "a", "loud": true}))
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::SchemaViolation { field, .. } if field == "loud"));
    }

    #[test]
    fn non_object_arguments_rejected() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let err = catalog
            .validate("echo", &serde_json::json!("{not json"))
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::SchemaViolation { field, .. } if field == "arguments"));
    }

    #[tokio::test]
    async fn executor_runs_valid_call() {
        let tool = Arc::new(EchoTool::new());
        let catalog = catalog_with(tool.clone());
        let executor = ToolExecutor::new(workspace());

        let request = ToolCallRequest::new("c1", "echo", serde_json::json!({"text": "ab", "times": 2}));
        let result = executor.run(&catalog, &request).await;
        assert!(result.is_ok());
        assert_eq!(result.call_id, "c1");
        assert_eq!(result.payload, serde_json::json!("abab"));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn executor_never_runs_invalid_call() {
        let tool = Arc::new(EchoTool::new());
        let catalog = catalog_with(tool.clone());
        let executor = ToolExecutor::new(workspace());

        let request = ToolCallRequest::new("c1", "echo", serde_json::json!({}));
        let result = executor.run(&catalog, &request).await;
        assert!(!result.is_ok());
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_result() {
        let catalog = catalog_with(Arc::new(EchoTool::new()));
        let executor = ToolExecutor::new(workspace());

        let request = ToolCallRequest::new("c9", "echo", serde_json::json!({"text": "fail"}));
        let result = executor.run(&catalog, &request).await;
        assert!(!result.is_ok());
        assert_eq!(result.payload, serde_json::json!("not found: fail"));
    }
}
