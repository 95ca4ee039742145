//! OpenAPI rendering of registered request and response schemas

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::error::{DefinitionError, DefinitionResult};

use super::{ApiObject, Refs};

const OPENAPI_VERSION: &str = "3.0.1";

#[derive(Debug, Clone)]
pub struct RequestSchema {
    pub api_obj: ApiObject,
    pub description: Option<String>,
}

impl RequestSchema {
    pub fn new(api_obj: ApiObject, description: Option<String>) -> Self {
        Self {
            api_obj,
            description,
        }
    }

    pub fn to_openapi(&self) -> (Value, Refs) {
        let (schema, refs) = self.api_obj.describe();
        let mut body = Map::new();
        body.insert(
            "content".to_string(),
            json!({ "application/json": { "schema": schema } }),
        );
        if let Some(description) = &self.description {
            body.insert("description".to_string(), json!(description));
        }
        (Value::Object(body), refs)
    }
}

#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub api_obj: ApiObject,
    pub status_code: u16,
    pub description: Option<String>,
}

impl ResponseSchema {
    pub fn new(api_obj: ApiObject, status_code: u16, description: Option<String>) -> Self {
        Self {
            api_obj,
            status_code,
            description,
        }
    }

    pub fn to_openapi(&self) -> (Value, Refs) {
        let (schema, refs) = self.api_obj.describe();
        // OpenAPI requires a description on every response object
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| default_description(self.status_code).to_string());
        (
            json!({
                "content": { "application/json": { "schema": schema } },
                "description": description,
            }),
            refs,
        )
    }
}

fn default_description(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Response",
    }
}

/// Accumulates operations and shared component schemas into one document.
#[derive(Debug, Clone)]
pub struct OpenApiSpec {
    title: String,
    description: Option<String>,
    version: String,
    paths: BTreeMap<String, Map<String, Value>>,
    components: Refs,
}

impl OpenApiSpec {
    pub fn new(title: &str, description: Option<&str>, version: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.map(str::to_string),
            version: version.to_string(),
            paths: BTreeMap::new(),
            components: Refs::new(),
        }
    }

    /// Add one operation. `method` is lower-cased as OpenAPI expects.
    pub fn add_operation(
        &mut self,
        path: &str,
        method: &str,
        request: Option<&RequestSchema>,
        responses: &[&ResponseSchema],
        tags: &[&str],
    ) -> DefinitionResult<()> {
        let mut operation = Map::new();
        if !tags.is_empty() {
            operation.insert("tags".to_string(), json!(tags));
        }
        if let Some(request) = request {
            let (body, refs) = request.to_openapi();
            self.merge_refs(refs)?;
            operation.insert("requestBody".to_string(), body);
        }
        let mut rendered = Map::new();
        for response in responses {
            let (body, refs) = response.to_openapi();
            self.merge_refs(refs)?;
            rendered.insert(response.status_code.to_string(), body);
        }
        operation.insert("responses".to_string(), Value::Object(rendered));
        self.paths
            .entry(path.to_string())
            .or_default()
            .insert(method.to_lowercase(), Value::Object(operation));
        Ok(())
    }

    /// Two schemas may share a reference name only if they render identically.
    fn merge_refs(&mut self, refs: Refs) -> DefinitionResult<()> {
        for (name, body) in refs {
            match self.components.get(&name) {
                Some(existing) if *existing != body => {
                    return Err(DefinitionError::ConflictingReference { name });
                }
                Some(_) => {}
                None => {
                    self.components.insert(name, body);
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let mut info = Map::new();
        info.insert("title".to_string(), json!(self.title));
        info.insert("version".to_string(), json!(self.version));
        if let Some(description) = &self.description {
            info.insert("description".to_string(), json!(description));
        }
        json!({
            "openapi": OPENAPI_VERSION,
            "info": info,
            "paths": self.paths,
            "components": { "schemas": self.components },
        })
    }
}
