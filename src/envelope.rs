//! Response envelopes
//!
//! Every body leaving a service goes through here so that success and error
//! payloads share one top-level shape:
//! `{"request_id"?, "model_context"?, <payload key>}`.

use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::ResponseConfig;
use crate::constants as cn;
use crate::error::ApiError;

/// Identifies the service that produced a response or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContext {
    pub model_name: String,
    pub api_version: String,
    pub model_meta: Map<String, Value>,
}

impl ModelContext {
    pub fn new(
        model_name: impl Into<String>,
        api_version: impl Into<String>,
        model_meta: Map<String, Value>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            api_version: api_version.into(),
            model_meta,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            cn::MODEL_NAME: self.model_name,
            cn::API_VERSION: self.api_version,
            cn::MODEL_META: self.model_meta,
        })
    }
}

/// A service result that has not been turned into a wire payload yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    data: Value,
    status_code: StatusCode,
    model_context: Option<ModelContext>,
}

impl Response {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            status_code: StatusCode::OK,
            model_context: None,
        }
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_model_context(mut self, context: ModelContext) -> Self {
        self.model_context = Some(context);
        self
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn model_context(&self) -> Option<&ModelContext> {
        self.model_context.as_ref()
    }

    /// Build the final payload. Object bodies get the envelope keys; any
    /// other JSON value (e.g. the plain string a GET returns) is sent as is.
    pub fn into_payload(self, config: &ResponseConfig, request_id: Option<&str>) -> Value {
        match self.data {
            Value::Object(body) => {
                let mut payload = Map::new();
                if config.return_request_id {
                    if let Some(id) = request_id {
                        payload.insert(cn::REQUEST_ID.to_string(), json!(id));
                    }
                }
                if let Some(context) = &self.model_context {
                    payload.insert(cn::MODEL_CONTEXT.to_string(), context.to_json());
                }
                payload.extend(body);
                Value::Object(payload)
            }
            other => other,
        }
    }
}

impl From<Value> for Response {
    fn from(data: Value) -> Self {
        Response::new(data)
    }
}

pub fn prediction_record(id: Value, prediction: Value) -> Value {
    json!({ cn::ID: id, cn::PREDICTION: prediction })
}

pub fn make_prediction_response(context: &ModelContext, id: Value, prediction: Value) -> Response {
    Response::new(json!({ cn::PREDICTIONS: prediction_record(id, prediction) }))
        .with_model_context(context.clone())
}

/// One record per `(id, prediction)` pair, in order.
pub fn make_batch_prediction_response<I>(context: &ModelContext, records: I) -> Response
where
    I: IntoIterator<Item = (Value, Value)>,
{
    let predictions: Vec<Value> = records
        .into_iter()
        .map(|(id, prediction)| prediction_record(id, prediction))
        .collect();
    Response::new(json!({ cn::PREDICTIONS: predictions })).with_model_context(context.clone())
}

/// Error envelope for `error`. `user_data` is the request payload that
/// triggered it; both it and the traceback are only included when the
/// policy asks for them.
pub fn error_payload(
    error: &ApiError,
    config: &ResponseConfig,
    request_id: Option<&str>,
    user_data: Option<&Value>,
) -> Value {
    let mut body = Map::new();
    body.insert(cn::ERROR_NAME.to_string(), json!(error.kind().name()));
    if config.return_message_on_error {
        body.insert(cn::ERROR_MESSAGES.to_string(), json!(error.messages()));
    }
    if config.return_traceback_on_error {
        if let Some(traceback) = error.traceback() {
            body.insert(cn::ERROR_TRACEBACK.to_string(), json!(traceback));
        }
    }
    if config.return_user_data_on_error {
        if let Some(data) = user_data {
            body.insert(cn::ERROR_USER_DATA.to_string(), data.clone());
        }
    }

    let mut response = Response::new(json!({ cn::ERROR: body })).with_status(error.status_code());
    if let Some(context) = error.model_context() {
        response = response.with_model_context(context.clone());
    }
    response.into_payload(config, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ModelContext {
        let mut meta = Map::new();
        meta.insert("team".to_string(), json!("search"));
        ModelContext::new("ratings", "v1", meta)
    }

    #[test]
    fn test_prediction_envelope() {
        let payload = make_prediction_response(&context(), json!(7), json!(5))
            .into_payload(&ResponseConfig::default(), Some("req-1"));
        assert_eq!(
            payload,
            json!({
                "request_id": "req-1",
                "model_context": {
                    "model_name": "ratings",
                    "api_version": "v1",
                    "model_meta": {"team": "search"}
                },
                "predictions": {"id": 7, "prediction": 5}
            })
        );
    }

    #[test]
    fn test_batch_envelope_keeps_order() {
        let payload = make_batch_prediction_response(
            &context(),
            vec![(json!(2), json!(20)), (json!(1), json!(10))],
        )
        .into_payload(&ResponseConfig::default(), None);
        assert_eq!(
            payload["predictions"],
            json!([{"id": 2, "prediction": 20}, {"id": 1, "prediction": 10}])
        );
        assert!(payload.get(cn::REQUEST_ID).is_none());
    }

    #[test]
    fn test_request_id_policy() {
        let config = ResponseConfig {
            return_request_id: false,
            ..Default::default()
        };
        let payload = Response::new(json!({"a": 1})).into_payload(&config, Some("req-1"));
        assert_eq!(payload, json!({"a": 1}));
    }

    #[test]
    fn test_non_object_bodies_pass_through() {
        let payload =
            Response::from(json!("live")).into_payload(&ResponseConfig::default(), Some("x"));
        assert_eq!(payload, json!("live"));
    }

    #[test]
    fn test_error_payload_defaults() {
        let error = ApiError::computation(anyhow::anyhow!("division by zero"))
            .with_model_context(context());
        let payload = error_payload(
            &error,
            &ResponseConfig::default(),
            Some("req-2"),
            Some(&json!({"id": 1})),
        );
        assert_eq!(payload["request_id"], "req-2");
        assert_eq!(payload["model_context"]["model_name"], "ratings");
        assert_eq!(
            payload["error"],
            json!({
                "name": "ComputationFailed",
                "messages": ["Could not serve model results successfully."]
            })
        );
    }

    #[test]
    fn test_error_payload_opt_in_fields() {
        let config = ResponseConfig {
            return_message_on_error: false,
            return_traceback_on_error: true,
            return_user_data_on_error: true,
            ..Default::default()
        };
        let error = ApiError::computation(anyhow::anyhow!("division by zero"));
        let payload = error_payload(&error, &config, None, Some(&json!({"id": 1})));
        let body = &payload["error"];
        assert!(body.get("messages").is_none());
        assert!(body["traceback"].as_str().unwrap().contains("division by zero"));
        assert_eq!(body["user_data"], json!({"id": 1}));
        assert!(payload.get("model_context").is_none());
    }
}
