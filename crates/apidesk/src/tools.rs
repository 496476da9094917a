use indoc::indoc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{Tool, ToolCall};

pub const LIST_ENDPOINTS: &str = "listEndpoints";
pub const GET_ENDPOINT_DETAIL: &str = "getEndpointDetail";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArguments {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct EndpointDetailArguments {
    api_name: String,
}

/// The closed set of tools the model may call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogTool {
    ListEndpoints,
    GetEndpointDetail { api_name: String },
}

impl CatalogTool {
    /// Resolve a tool call by name and validate its arguments against the declared schema
    pub fn parse(call: &ToolCall) -> ToolResult<Self> {
        // models sometimes send null for tools without parameters
        let arguments = match &call.arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        let invalid = |e: serde_json::Error| {
            ToolError::InvalidArguments(format!("{}: {}", call.name, e))
        };

        match call.name.as_str() {
            LIST_ENDPOINTS => {
                serde_json::from_value::<NoArguments>(arguments).map_err(invalid)?;
                Ok(CatalogTool::ListEndpoints)
            }
            GET_ENDPOINT_DETAIL => {
                let args: EndpointDetailArguments =
                    serde_json::from_value(arguments).map_err(invalid)?;
                Ok(CatalogTool::GetEndpointDetail {
                    api_name: args.api_name,
                })
            }
            other => Err(ToolError::ToolNotFound(other.to_string())),
        }
    }
}

/// Executes catalog tools on behalf of the model
#[derive(Clone)]
pub struct ToolRegistry {
    catalog: Arc<Catalog>,
    declarations: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            declarations: declarations(),
        }
    }

    /// Tool declarations advertised to the model
    pub fn declarations(&self) -> &[Tool] {
        &self.declarations
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn dispatch(&self, call: &ToolCall) -> ToolResult<Value> {
        match CatalogTool::parse(call)? {
            CatalogTool::ListEndpoints => Ok(json!(self.catalog.names())),
            CatalogTool::GetEndpointDetail { api_name } => {
                let endpoint = self.catalog.find(&api_name).ok_or_else(|| {
                    ToolError::NotFound(format!("API with name \"{}\" not found.", api_name))
                })?;
                serde_json::to_value(endpoint).map_err(|e| ToolError::Execution(e.to_string()))
            }
        }
    }
}

fn declarations() -> Vec<Tool> {
    vec![
        Tool::new(
            LIST_ENDPOINTS,
            "Returns a list of all available API names.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
        Tool::new(
            GET_ENDPOINT_DETAIL,
            "Returns detailed information about a specific API.",
            json!({
                "type": "object",
                "properties": {
                    "apiName": {
                        "type": "string",
                        "description": indoc! {"
                            The exact name of the API to retrieve details for, as returned by listEndpoints.
                            When answering with the details, put any example request in a fenced code block.
                        "}
                    }
                },
                "required": ["apiName"],
                "additionalProperties": false
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Catalog::builtin())
    }

    #[test]
    fn test_declarations() {
        let registry = registry();
        let names: Vec<&str> = registry
            .declarations()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec![LIST_ENDPOINTS, GET_ENDPOINT_DETAIL]);
        assert_eq!(
            registry.declarations()[1].input_schema["required"],
            json!(["apiName"])
        );
    }

    #[test]
    fn test_list_endpoints() {
        let result = registry().dispatch(&ToolCall::new(LIST_ENDPOINTS, json!({})));
        assert_eq!(
            result,
            Ok(json!([
                "Search People",
                "Enrich People Data",
                "Retrieve LinkedIn Posts"
            ]))
        );
    }

    #[test]
    fn test_list_endpoints_accepts_null_arguments() {
        let result = registry().dispatch(&ToolCall::new(LIST_ENDPOINTS, Value::Null));
        assert!(result.is_ok());
    }

    #[test]
    fn test_get_endpoint_detail() {
        let result = registry()
            .dispatch(&ToolCall::new(
                GET_ENDPOINT_DETAIL,
                json!({"apiName": "Enrich People Data"}),
            ))
            .unwrap();

        assert_eq!(result["name"], "Enrich People Data");
        assert_eq!(result["method"], "GET");
        assert_eq!(result["path"], "/screener/person/enrich");
        assert_eq!(
            result["queryParams"]["real_time_search"],
            "If set to True, performs a real-time search if data is not found in the database."
        );
        assert_eq!(
            result["responses"]["200"],
            "Successful response with enriched data."
        );
    }

    #[test]
    fn test_get_endpoint_detail_not_found() {
        let result = registry().dispatch(&ToolCall::new(
            GET_ENDPOINT_DETAIL,
            json!({"apiName": "Company API"}),
        ));
        assert_eq!(
            result,
            Err(ToolError::NotFound(
                "API with name \"Company API\" not found.".to_string()
            ))
        );
    }

    #[test]
    fn test_get_endpoint_detail_is_case_sensitive() {
        let registry = registry();
        let found = registry
            .dispatch(&ToolCall::new(
                GET_ENDPOINT_DETAIL,
                json!({"apiName": "Search People"}),
            ))
            .unwrap();
        assert_eq!(found["name"], "Search People");

        let result = registry.dispatch(&ToolCall::new(
            GET_ENDPOINT_DETAIL,
            json!({"apiName": "search people"}),
        ));
        assert_eq!(
            result,
            Err(ToolError::NotFound(
                "API with name \"search people\" not found.".to_string()
            ))
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let registry = registry();
        for arguments in [
            json!({}),
            json!({"apiName": 7}),
            json!({"apiName": "Search People", "extra": true}),
            json!("Search People"),
        ] {
            let result = registry.dispatch(&ToolCall::new(GET_ENDPOINT_DETAIL, arguments.clone()));
            assert!(
                matches!(result, Err(ToolError::InvalidArguments(_))),
                "arguments {} gave {:?}",
                arguments,
                result
            );
        }

        let result = registry.dispatch(&ToolCall::new(LIST_ENDPOINTS, json!({"page": 2})));
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn test_unknown_tool() {
        let result = registry().dispatch(&ToolCall::new("deleteEverything", json!({})));
        assert_eq!(
            result,
            Err(ToolError::ToolNotFound("deleteEverything".to_string()))
        );
    }
}
