//! Closed tool registry backed by the fixture catalog.
//!
//! Every specialist publishes a static table of [`CatalogToolSpec`] entries; the table is the whole
//! set of names that specialist's model may call.
use super::*;

pub(crate) type CatalogHandler = fn(&FixtureCatalog, Value) -> ToolExecutionResult;

pub(crate) struct CatalogToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: fn() -> Value,
    pub handler: CatalogHandler,
}

pub(crate) struct CatalogTool {
    spec: &'static CatalogToolSpec,
    catalog: Arc<FixtureCatalog>,
}

impl CatalogTool {
    pub(crate) fn new(spec: &'static CatalogToolSpec, catalog: Arc<FixtureCatalog>) -> Self {
        Self { spec, catalog }
    }
}

#[async_trait]
impl AgentTool for CatalogTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.spec.name.to_string(),
            description: self.spec.description.to_string(),
            parameters: (self.spec.parameters)(),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        tracing::debug!(tool = self.spec.name, "executing catalog tool");
        (self.spec.handler)(&self.catalog, arguments)
    }
}

/// Deserializes `arguments` into `P`, runs `body` and encodes its output. `Err` text becomes the
/// `{"error": ...}` payload.
pub(crate) fn with_params<P, R>(
    tool: &str,
    arguments: Value,
    body: impl FnOnce(P) -> Result<R, String>,
) -> ToolExecutionResult
where
    P: DeserializeOwned,
    R: Serialize,
{
    let params = match parse_tool_arguments::<P>(tool, arguments) {
        Ok(params) => params,
        Err(error) => return error.into(),
    };
    match body(params).map(|output| serde_json::to_value(output)) {
        Ok(Ok(value)) => ToolExecutionResult::ok(value),
        Ok(Err(error)) => {
            ToolExecutionResult::error_message(format!("failed to encode '{tool}' output: {error}"))
        }
        Err(message) => ToolExecutionResult::error_message(message),
    }
}

pub(crate) fn not_found(entity: &str, name: &str) -> String {
    format!("{entity} '{name}' not found")
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NoParams {}

pub(crate) fn no_params_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

/// Schema fragment for an optional value of JSON type `kind`; models often send `null`.
pub(crate) fn nullable(kind: &str, description: &str) -> Value {
    json!({ "type": [kind, "null"], "description": description })
}
