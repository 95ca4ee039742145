//! Service lifecycle
//!
//! A service is built once from a [`ServiceDefinition`] plus a
//! [`ServiceDraft`] describing what the concrete service adds (its action,
//! schemas and metadata hook). The result is an immutable [`ServiceCore`];
//! per-request work goes through [`Service::handle`].

pub mod prediction;

pub use prediction::{PredictionService, PredictionServiceBuilder};

use std::collections::HashMap;
use std::fmt;

use actix_web::http::{Method, StatusCode};
use bytes::Bytes;
use dashmap::DashSet;
use serde_json::{Map, Value, json};

use crate::config::ResponseConfig;
use crate::constants as cn;
use crate::envelope::{ModelContext, Response};
use crate::error::{ApiError, ApiResult, DefinitionError, DefinitionResult, ErrorKind};
use crate::schema::{self, ApiObject, RequestSchema, ResponseSchema};

/// Log target for structured api-call and exception records.
pub const API_LOG_TARGET: &str = "porter::api";

/// Ids handed out to services. Owned by the application root and shared
/// with every service built for it.
#[derive(Debug, Default)]
pub struct IdRegistry {
    ids: DashSet<String>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`. Fails if it was already claimed.
    pub fn register(&self, id: &str) -> DefinitionResult<()> {
        if self.ids.insert(id.to_string()) {
            Ok(())
        } else {
            Err(DefinitionError::DuplicateIdentifier { id: id.to_string() })
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget every id. Meant for test isolation.
    pub fn reset(&self) {
        self.ids.clear();
    }
}

/// State of one call: lives for the duration of a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    request_id: String,
    body: Bytes,
}

impl RequestContext {
    pub fn new(method: Method, request_id: impl Into<String>, body: Bytes) -> Self {
        Self {
            method,
            request_id: request_id.into(),
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> ApiResult<Value> {
        if self.body.is_empty() {
            return Err(ApiError::malformed("request body is empty"));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::malformed(format!("request body is not valid JSON: {}", e)))
    }

    /// The body as it should appear in logs and in `user_data`: decoded if
    /// it is JSON, the raw text otherwise.
    pub fn request_data(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// User-facing options shared by every service.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub api_version: String,
    pub meta: Map<String, Value>,
    pub namespace: String,
    pub log_api_calls: bool,
    pub validate_request_data: bool,
    /// Validates every outgoing payload. Adds latency; meant for development.
    pub validate_response_data: bool,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_version: api_version.into(),
            meta: Map::new(),
            namespace: String::new(),
            log_api_calls: false,
            validate_request_data: false,
            validate_response_data: false,
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_log_api_calls(mut self, enabled: bool) -> Self {
        self.log_api_calls = enabled;
        self
    }

    pub fn with_validate_request_data(mut self, enabled: bool) -> Self {
        self.validate_request_data = enabled;
        self
    }

    pub fn with_validate_response_data(mut self, enabled: bool) -> Self {
        self.validate_response_data = enabled;
        self
    }
}

type FinalizeMeta = Box<dyn FnOnce(Map<String, Value>) -> DefinitionResult<Map<String, Value>>>;

/// What a concrete service contributes at construction.
pub struct ServiceDraft {
    action: String,
    service_class: &'static str,
    id: Option<String>,
    request_schemas: Vec<(Method, RequestSchema)>,
    response_schemas: Vec<(Method, ResponseSchema)>,
    finalize_meta: Option<FinalizeMeta>,
}

impl ServiceDraft {
    pub fn new(action: impl Into<String>, service_class: &'static str) -> Self {
        Self {
            action: action.into(),
            service_class,
            id: None,
            request_schemas: Vec::new(),
            response_schemas: Vec::new(),
            finalize_meta: None,
        }
    }

    /// Use `id` instead of the endpoint as the service id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn request_schema(mut self, method: Method, schema: RequestSchema) -> Self {
        self.request_schemas.push((method, schema));
        self
    }

    pub fn response_schema(mut self, method: Method, schema: ResponseSchema) -> Self {
        self.response_schemas.push((method, schema));
        self
    }

    /// Runs once, after the metadata is validated and before the service is
    /// registered.
    pub fn finalize_meta<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(Map<String, Value>) -> DefinitionResult<Map<String, Value>> + 'static,
    {
        self.finalize_meta = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ServiceDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDraft")
            .field("action", &self.action)
            .field("service_class", &self.service_class)
            .field("id", &self.id)
            .field("finalize_meta", &self.finalize_meta.is_some())
            .finish()
    }
}

/// The immutable part every service shares.
#[derive(Debug)]
pub struct ServiceCore {
    id: String,
    name: String,
    api_version: String,
    meta: Map<String, Value>,
    namespace: String,
    action: String,
    endpoint: String,
    service_class: &'static str,
    log_api_calls: bool,
    validate_request_data: bool,
    validate_response_data: bool,
    request_schemas: HashMap<Method, RequestSchema>,
    response_schemas: HashMap<(Method, u16), ResponseSchema>,
    model_context: ModelContext,
}

impl ServiceCore {
    pub fn build(
        definition: ServiceDefinition,
        draft: ServiceDraft,
        registry: &IdRegistry,
    ) -> DefinitionResult<Self> {
        check_meta(&definition.meta)?;
        let namespace = normalize_namespace(&definition.namespace);
        let endpoint = make_endpoint(
            &namespace,
            &definition.name,
            &definition.api_version,
            &draft.action,
        );

        let mut response_schemas = HashMap::new();
        for status in [400, 422, 500] {
            response_schemas.insert(
                (Method::POST, status),
                ResponseSchema::new(schema::model_context_error(), status, None),
            );
        }
        for (method, response) in draft.response_schemas {
            check_compiles(&response.api_obj)?;
            response_schemas.insert((method, response.status_code), response);
        }
        let mut request_schemas = HashMap::new();
        for (method, request) in draft.request_schemas {
            check_compiles(&request.api_obj)?;
            request_schemas.insert(method, request);
        }

        let meta = match draft.finalize_meta {
            Some(hook) => {
                let meta = hook(definition.meta)?;
                check_meta(&meta)?;
                meta
            }
            None => definition.meta,
        };

        // last fallible step: a rejected id leaves nothing behind
        let id = draft.id.unwrap_or_else(|| endpoint.clone());
        registry.register(&id)?;

        if definition.validate_response_data {
            log::warn!(
                "Response validation is enabled for {}; this adds latency to every request and is meant for development",
                id
            );
        }

        let model_context = ModelContext::new(
            definition.name.clone(),
            definition.api_version.clone(),
            meta.clone(),
        );
        Ok(Self {
            id,
            name: definition.name,
            api_version: definition.api_version,
            meta,
            namespace,
            action: draft.action,
            endpoint,
            service_class: draft.service_class,
            log_api_calls: definition.log_api_calls,
            validate_request_data: definition.validate_request_data,
            validate_response_data: definition.validate_response_data,
            request_schemas,
            response_schemas,
            model_context,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn service_class(&self) -> &'static str {
        self.service_class
    }

    pub fn log_api_calls(&self) -> bool {
        self.log_api_calls
    }

    pub fn validate_request_data(&self) -> bool {
        self.validate_request_data
    }

    pub fn validate_response_data(&self) -> bool {
        self.validate_response_data
    }

    pub fn model_context(&self) -> &ModelContext {
        &self.model_context
    }

    pub fn request_schema(&self, method: &Method) -> Option<&RequestSchema> {
        self.request_schemas.get(method)
    }

    pub fn response_schema(&self, method: &Method, status: u16) -> Option<&ResponseSchema> {
        self.response_schemas.get(&(method.clone(), status))
    }

    /// Request schemas ordered by method name.
    pub fn request_schemas(&self) -> Vec<(&Method, &RequestSchema)> {
        let mut schemas: Vec<_> = self.request_schemas.iter().collect();
        schemas.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        schemas
    }

    /// Response schemas ordered by method name, then status.
    pub fn response_schemas(&self) -> Vec<(&Method, &ResponseSchema)> {
        let mut schemas: Vec<_> = self
            .response_schemas
            .iter()
            .map(|((method, _), schema)| (method, schema))
            .collect();
        schemas.sort_by(|a, b| {
            (a.0.as_str(), a.1.status_code).cmp(&(b.0.as_str(), b.1.status_code))
        });
        schemas
    }

    /// Validate `payload` against the registered request schema for `method`.
    pub fn validate_request(&self, method: &Method, payload: &Value) -> ApiResult<()> {
        match self.request_schema(method) {
            Some(schema) => schema
                .api_obj
                .validate(payload)
                .map_err(|e| ApiError::schema(e.to_string())),
            None => Ok(()),
        }
    }

    /// Validate an outgoing payload. A mismatch is our fault, not the
    /// caller's, so it is reported as a computation failure.
    pub fn validate_response(
        &self,
        method: &Method,
        status: StatusCode,
        payload: &Value,
    ) -> ApiResult<()> {
        match self.response_schema(method, status.as_u16()) {
            Some(schema) => schema
                .api_obj
                .validate(payload)
                .map_err(ApiError::computation),
            None => Ok(()),
        }
    }

    /// Tag an error with this service. Anything that is not already an
    /// [`ApiError`] becomes a computation failure.
    pub fn contain(&self, error: anyhow::Error) -> ApiError {
        let error = match error.downcast::<ApiError>() {
            Ok(api_error) => api_error,
            Err(other) => ApiError::computation(other),
        };
        error.with_model_context(self.model_context.clone())
    }

    pub fn health(&self, status: &str) -> Value {
        json!({
            cn::MODEL_CONTEXT: self.model_context.to_json(),
            cn::STATUS: status,
            cn::ENDPOINT: self.endpoint,
        })
    }
}

fn check_meta(meta: &Map<String, Value>) -> DefinitionResult<()> {
    let reserved: Vec<&str> = cn::RESERVED_META_KEYS
        .iter()
        .copied()
        .filter(|key| meta.contains_key(*key))
        .collect();
    if reserved.is_empty() {
        Ok(())
    } else {
        Err(DefinitionError::InvalidMeta {
            reason: format!("the following keys are reserved: {}", reserved.join(", ")),
        })
    }
}

fn check_compiles(api_obj: &ApiObject) -> DefinitionResult<()> {
    api_obj.validator().map(|_| ()).map_err(|e| e.clone())
}

/// Leading `/`, no trailing `/`; empty stays empty.
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

pub fn make_endpoint(namespace: &str, name: &str, api_version: &str, action: &str) -> String {
    format!("{}/{}/{}/{}", namespace, name, api_version, action)
}

/// Common contract of every service.
pub trait Service: Send + Sync {
    fn core(&self) -> &ServiceCore;

    fn serve(&self, ctx: &RequestContext) -> anyhow::Result<Response>;

    /// Ready iff equal to [`cn::READY`].
    fn status(&self) -> String;

    /// Methods bound to the endpoint.
    fn methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::POST]
    }

    fn id(&self) -> &str {
        self.core().id()
    }

    fn is_ready(&self) -> bool {
        self.status() == cn::READY
    }

    /// Run `serve` and produce the final status and payload.
    ///
    /// Errors come back as [`ApiError`]s carrying this service's model
    /// context; turning them into an error envelope is up to the caller.
    fn handle(&self, ctx: &RequestContext, config: &ResponseConfig) -> ApiResult<(StatusCode, Value)> {
        let core = self.core();
        let result = self
            .serve(ctx)
            .map_err(|e| core.contain(e))
            .and_then(|response| {
                let status = response.status_code();
                let payload = response.into_payload(config, Some(ctx.request_id()));
                if core.validate_response_data() && status.is_success() {
                    core.validate_response(ctx.method(), status, &payload)
                        .map_err(|e| e.with_model_context(core.model_context().clone()))?;
                }
                Ok((status, payload))
            });

        if let Err(error) = &result {
            log_exception(core, ctx, error);
        }
        if core.log_api_calls() {
            let response_data = result.as_ref().ok().map(|(_, payload)| payload.clone());
            log_api_call(core, ctx, response_data);
        }
        result
    }
}

fn log_api_call(core: &ServiceCore, ctx: &RequestContext, response_data: Option<Value>) {
    log::info!(
        target: API_LOG_TARGET,
        "{}",
        json!({
            cn::REQUEST_ID: ctx.request_id(),
            "request_data": ctx.request_data(),
            "response_data": response_data,
            "service_class": core.service_class(),
            "event": "api_call",
        })
    );
}

fn log_exception(core: &ServiceCore, ctx: &RequestContext, error: &ApiError) {
    let record = json!({
        cn::REQUEST_ID: ctx.request_id(),
        "service_class": core.service_class(),
        "event": "exception",
        "error": error.kind().name(),
        "message": error.traceback().unwrap_or_else(|| error.kind().to_string()),
    });
    match error.kind() {
        ErrorKind::ComputationFailed => log::error!(target: API_LOG_TARGET, "{}", record),
        _ => log::debug!(target: API_LOG_TARGET, "{}", record),
    }
}
