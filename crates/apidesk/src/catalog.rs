//! The catalog of documented endpoints the assistant can talk about.
//!
//! A catalog is built once and never changes afterwards, so it is shared between
//! requests behind an `Arc` without any locking.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::CatalogError;

/// Top-level keys of a catalog document that describe the API as a whole
const DOCUMENT_KEYS: [&str; 5] = ["info", "servers", "schemes", "securityDefinitions", "tags"];

/// Documentation of one HTTP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub name: String,
    pub method: String,
    pub path: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
    /// Response description by status code
    #[serde(default)]
    pub responses: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    endpoints: Vec<EndpointDescriptor>,
}

lazy_static! {
    static ref BUILTIN: Arc<Catalog> = Arc::new(Catalog::new(people_api()));
}

impl Catalog {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        Self { endpoints }
    }

    /// The People API catalog that ships with the assistant
    pub fn builtin() -> Arc<Catalog> {
        Arc::clone(&BUILTIN)
    }

    /// Read a catalog document from disk, see [`Catalog::from_document`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw)?;
        Self::from_document(&document)
    }

    /// Build a catalog from a declarative API document.
    ///
    /// Every top-level key other than the document metadata is a section, mapping paths
    /// to methods to endpoint details. An endpoint is named by its `name`, else its
    /// `summary`, else its path.
    pub fn from_document(document: &Value) -> Result<Self, CatalogError> {
        let sections = document
            .as_object()
            .ok_or_else(|| CatalogError::Invalid("document must be an object".to_string()))?;

        let mut endpoints = Vec::new();
        for (section, paths) in sections {
            if DOCUMENT_KEYS.contains(&section.as_str()) {
                continue;
            }
            let paths = paths.as_object().ok_or_else(|| {
                CatalogError::Invalid(format!("section {} must map paths to methods", section))
            })?;

            for (path, methods) in paths {
                let methods = methods.as_object().ok_or_else(|| {
                    CatalogError::Invalid(format!("path {} must map methods to details", path))
                })?;
                for (method, details) in methods {
                    endpoints.push(descriptor_from_details(path, method, details)?);
                }
            }
        }

        Ok(Self { endpoints })
    }

    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    pub fn names(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name.clone()).collect()
    }

    pub fn summaries(&self) -> Vec<EndpointSummary> {
        self.endpoints
            .iter()
            .map(|e| EndpointSummary {
                name: e.name.clone(),
                description: e.description.clone(),
            })
            .collect()
    }

    /// Exact, case-sensitive lookup by endpoint name
    pub fn find(&self, name: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn descriptor_from_details(
    path: &str,
    method: &str,
    details: &Value,
) -> Result<EndpointDescriptor, CatalogError> {
    let details = details.as_object().ok_or_else(|| {
        CatalogError::Invalid(format!("{} {} must be an object", method, path))
    })?;
    let text = |key: &str| details.get(key).and_then(Value::as_str).map(str::to_string);

    let name = text("name")
        .or_else(|| text("summary"))
        .unwrap_or_else(|| path.to_string());

    let mut headers = BTreeMap::new();
    let mut query_params = BTreeMap::new();
    let mut body = None;
    for parameter in details
        .get("parameters")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(param_name) = parameter.get("name").and_then(Value::as_str) else {
            continue;
        };
        let description = parameter
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match parameter.get("in").and_then(Value::as_str) {
            Some("query") => {
                query_params.insert(param_name.to_string(), description);
            }
            Some("header") => {
                headers.insert(param_name.to_string(), description);
            }
            Some("body") => {
                body = parameter
                    .get("example")
                    .or_else(|| parameter.get("schema"))
                    .cloned();
            }
            _ => {}
        }
    }

    if details
        .get("security")
        .and_then(Value::as_array)
        .is_some_and(|s| !s.is_empty())
    {
        headers
            .entry("Authorization".to_string())
            .or_insert_with(|| "YOUR_SECRET_TOKEN".to_string());
    }

    Ok(EndpointDescriptor {
        name,
        method: method.to_uppercase(),
        path: path.to_string(),
        description: text("description").unwrap_or_default(),
        headers: (!headers.is_empty()).then_some(headers),
        body,
        query_params: (!query_params.is_empty()).then_some(query_params),
        responses: responses_from(details),
    })
}

fn responses_from(details: &Map<String, Value>) -> BTreeMap<String, String> {
    let Some(responses) = details.get("responses").and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    responses
        .iter()
        .map(|(status, response)| {
            let description = match response {
                Value::String(s) => s.clone(),
                other => other
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            };
            (status.clone(), description)
        })
        .collect()
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn people_api() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor {
            name: "Search People".to_string(),
            method: "POST".to_string(),
            path: "/screener/person/search".to_string(),
            description:
                "Allows querying Crustdata's People database for detailed professional information."
                    .to_string(),
            headers: Some(string_map(&[
                ("Authorization", "YOUR_SECRET_TOKEN"),
                ("Content-Type", "application/json"),
            ])),
            body: Some(json!({
                "filters": [{
                    "filter_type": "COMPANY_HEADCOUNT",
                    "type": "in",
                    "value": ["5,001-10,000", "1-10", "11-50"]
                }],
                "page": 1
            })),
            query_params: None,
            responses: string_map(&[
                ("200", "A JSON response containing profiles and total profile count."),
                ("400", "Bad request, check request body."),
            ]),
        },
        EndpointDescriptor {
            name: "Enrich People Data".to_string(),
            method: "GET".to_string(),
            path: "/screener/person/enrich".to_string(),
            description: "Enrich data for individuals using LinkedIn URLs or business emails."
                .to_string(),
            headers: None,
            body: None,
            query_params: Some(string_map(&[
                ("linkedin_profile_url", "Comma-separated list of LinkedIn profile URLs"),
                ("business_email", "Comma-separated list of business email addresses"),
                (
                    "real_time_search",
                    "If set to True, performs a real-time search if data is not found in the database.",
                ),
            ])),
            responses: string_map(&[
                ("200", "Successful response with enriched data."),
                ("400", "Bad request, check query parameters."),
            ]),
        },
        EndpointDescriptor {
            name: "Retrieve LinkedIn Posts".to_string(),
            method: "GET".to_string(),
            path: "/screener/linkedin_posts".to_string(),
            description:
                "Retrieves recent LinkedIn posts and engagement metrics for a specified person."
                    .to_string(),
            headers: None,
            body: None,
            query_params: Some(string_map(&[
                ("person_linkedin_url", "LinkedIn profile URL"),
                ("company_domain", "LinkedIn company domain"),
                ("page", "Page number for pagination"),
            ])),
            responses: string_map(&[
                ("200", "A list of recent LinkedIn posts with engagement metrics."),
                ("400", "Bad request, check query parameters."),
            ]),
        },
    ]
}
