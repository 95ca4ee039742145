//! The prediction service: validate, preprocess, predict, postprocess and
//! assemble `{id, prediction}` records.

use std::fmt;
use std::sync::Arc;

use actix_web::http::Method;
use serde_json::{Value, json};

use crate::batch::{self, Batch};
use crate::constants as cn;
use crate::datascience::{AdditionalChecks, PostProcessor, Predictor, Transformer};
use crate::envelope::{self, Response};
use crate::error::{ApiError, ApiResult, DefinitionError, DefinitionResult};
use crate::schema::{self, ApiObject, RequestSchema, Required, ResponseSchema};

use super::{IdRegistry, RequestContext, Service, ServiceCore, ServiceDefinition, ServiceDraft};

/// Body returned for GET on a prediction endpoint.
pub const LIVENESS_MESSAGE: &str = "This endpoint is live. Send POST requests for predictions";

pub struct PredictionService {
    core: ServiceCore,
    model: Arc<dyn Predictor>,
    preprocessor: Option<Arc<dyn Transformer>>,
    postprocessor: Option<Arc<dyn PostProcessor>>,
    additional_checks: Option<AdditionalChecks>,
    batch_prediction: bool,
    allow_nulls: bool,
    feature_columns: Option<Vec<String>>,
    required_fields: Vec<String>,
}

impl PredictionService {
    pub fn builder<P>(definition: ServiceDefinition, model: P) -> PredictionServiceBuilder
    where
        P: Predictor + 'static,
    {
        PredictionServiceBuilder::new(definition, Arc::new(model))
    }

    pub fn batch_prediction(&self) -> bool {
        self.batch_prediction
    }

    /// Columns the model sees, when a feature schema was given.
    pub fn feature_columns(&self) -> Option<&[String]> {
        self.feature_columns.as_deref()
    }

    /// Run the pipeline on a POST body.
    pub fn predict(&self, ctx: &RequestContext) -> ApiResult<Response> {
        let payload = ctx.json()?;
        let input = Batch::from_value(&payload, self.batch_prediction)?;
        if self.core.validate_request_data() {
            self.core.validate_request(&Method::POST, &payload)?;
        }
        if input.is_empty() {
            return Ok(envelope::make_batch_prediction_response(
                self.core.model_context(),
                Vec::new(),
            ));
        }
        batch::check_required_fields(&input, &self.required_fields, self.allow_nulls)?;

        let features = match &self.feature_columns {
            Some(columns) => input.select(columns),
            None => input.clone(),
        };
        if let Some(checks) = &self.additional_checks {
            checks(&features).map_err(|e| match e.downcast::<ApiError>() {
                Ok(api_error) => api_error,
                Err(other) => ApiError::user_check(other.to_string()),
            })?;
        }

        let preprocessed = match &self.preprocessor {
            Some(preprocessor) => preprocessor
                .process(features.clone())
                .map_err(|e| self.core.contain(e))?,
            None => features.clone(),
        };
        let predictions = self
            .model
            .predict(&preprocessed)
            .map_err(|e| self.core.contain(e))?;
        let predictions = match &self.postprocessor {
            Some(postprocessor) => postprocessor
                .process(&input, &preprocessed, predictions)
                .map_err(|e| self.core.contain(e))?,
            None => predictions,
        };

        self.assemble(&input, predictions)
    }

    fn assemble(&self, input: &Batch, predictions: Vec<Value>) -> ApiResult<Response> {
        let context = self.core.model_context();
        if self.batch_prediction {
            if predictions.len() != input.len() {
                return Err(self.core.contain(anyhow::anyhow!(
                    "model returned {} predictions for {} rows",
                    predictions.len(),
                    input.len()
                )));
            }
            let ids = input.column(cn::ID).into_iter().cloned();
            Ok(envelope::make_batch_prediction_response(
                context,
                ids.zip(predictions),
            ))
        } else {
            let prediction = predictions.into_iter().next().ok_or_else(|| {
                self.core
                    .contain(anyhow::anyhow!("model returned no prediction"))
            })?;
            Ok(envelope::make_prediction_response(
                context,
                input.value(0, cn::ID).clone(),
                prediction,
            ))
        }
    }
}

impl Service for PredictionService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn serve(&self, ctx: &RequestContext) -> anyhow::Result<Response> {
        match *ctx.method() {
            Method::GET => Ok(Response::from(json!(LIVENESS_MESSAGE))),
            Method::POST => Ok(self.predict(ctx)?),
            ref other => Err(ApiError::method_not_allowed(other.as_str()).into()),
        }
    }

    fn status(&self) -> String {
        cn::READY.to_string()
    }
}

impl fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionService")
            .field("id", &self.core.id())
            .field("batch_prediction", &self.batch_prediction)
            .field("allow_nulls", &self.allow_nulls)
            .field("feature_columns", &self.feature_columns)
            .finish()
    }
}

pub struct PredictionServiceBuilder {
    definition: ServiceDefinition,
    model: Arc<dyn Predictor>,
    action: String,
    id: Option<String>,
    preprocessor: Option<Arc<dyn Transformer>>,
    postprocessor: Option<Arc<dyn PostProcessor>>,
    additional_checks: Option<AdditionalChecks>,
    batch_prediction: bool,
    allow_nulls: bool,
    feature_schema: Option<ApiObject>,
    prediction_schema: Option<ApiObject>,
}

impl PredictionServiceBuilder {
    fn new(definition: ServiceDefinition, model: Arc<dyn Predictor>) -> Self {
        Self {
            definition,
            model,
            action: cn::PREDICTION_ACTION.to_string(),
            id: None,
            preprocessor: None,
            postprocessor: None,
            additional_checks: None,
            batch_prediction: false,
            allow_nulls: false,
            feature_schema: None,
            prediction_schema: None,
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn preprocessor<T: Transformer + 'static>(mut self, preprocessor: T) -> Self {
        self.preprocessor = Some(Arc::new(preprocessor));
        self
    }

    pub fn postprocessor<T: PostProcessor + 'static>(mut self, postprocessor: T) -> Self {
        self.postprocessor = Some(Arc::new(postprocessor));
        self
    }

    pub fn additional_checks<F>(mut self, checks: F) -> Self
    where
        F: Fn(&Batch) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.additional_checks = Some(Arc::new(checks));
        self
    }

    pub fn batch_prediction(mut self, enabled: bool) -> Self {
        self.batch_prediction = enabled;
        self
    }

    pub fn allow_nulls(mut self, enabled: bool) -> Self {
        self.allow_nulls = enabled;
        self
    }

    /// Declares the feature columns. Must be an object with properties.
    pub fn feature_schema(mut self, schema: ApiObject) -> Self {
        self.feature_schema = Some(schema);
        self
    }

    pub fn prediction_schema(mut self, schema: ApiObject) -> Self {
        self.prediction_schema = Some(schema);
        self
    }

    pub fn build(self, registry: &IdRegistry) -> DefinitionResult<PredictionService> {
        let mut draft = ServiceDraft::new(self.action.clone(), "PredictionService")
            .response_schema(
                Method::GET,
                ResponseSchema::new(ApiObject::string(), 200, None),
            )
            .response_schema(
                Method::POST,
                ResponseSchema::new(
                    prediction_response_schema(self.prediction_schema.clone(), self.batch_prediction),
                    200,
                    None,
                ),
            );
        if let Some(id) = &self.id {
            draft = draft.with_id(id.clone());
        }

        let mut feature_columns = None;
        let mut required_fields = vec![cn::ID.to_string()];
        if let Some(features) = &self.feature_schema {
            let instance = instance_schema(features)?;
            feature_columns = Some(
                features
                    .properties()
                    .unwrap_or_default()
                    .iter()
                    .map(|(name, _)| name.clone())
                    .filter(|name| name != cn::ID)
                    .collect(),
            );
            required_fields.extend(
                features
                    .required()
                    .unwrap_or_default()
                    .iter()
                    .filter(|name| *name != cn::ID)
                    .cloned(),
            );
            let request = if self.batch_prediction {
                ApiObject::array(instance)
            } else {
                instance
            };
            draft = draft.request_schema(Method::POST, RequestSchema::new(request, None));
        }

        let core = ServiceCore::build(self.definition, draft, registry)?;
        log::info!(
            "Built prediction service {} (batch_prediction={}, allow_nulls={})",
            core.id(),
            self.batch_prediction,
            self.allow_nulls
        );
        Ok(PredictionService {
            core,
            model: self.model,
            preprocessor: self.preprocessor,
            postprocessor: self.postprocessor,
            additional_checks: self.additional_checks,
            batch_prediction: self.batch_prediction,
            allow_nulls: self.allow_nulls,
            feature_columns,
            required_fields,
        })
    }
}

/// The feature schema with a required integer `id` ahead of the user's
/// properties.
fn instance_schema(features: &ApiObject) -> DefinitionResult<ApiObject> {
    let Some(properties) = features.properties() else {
        return Err(DefinitionError::InvalidSchema {
            reason: format!(
                "feature schema must be an object with properties, got {}",
                features.type_name()
            ),
        });
    };
    let mut required = vec![cn::ID.to_string()];
    required.extend(
        features
            .required()
            .unwrap_or_default()
            .iter()
            .filter(|name| *name != cn::ID)
            .cloned(),
    );

    let id = ApiObject::integer().with_description("An ID uniquely identifying each instance.");
    let props = std::iter::once((cn::ID.to_string(), id)).chain(
        properties
            .iter()
            .filter(|(name, _)| name != cn::ID)
            .cloned(),
    );
    let mut instance = ApiObject::object(props)
        .with_params(features.additional_params().clone())
        .with_required(Required::Subset(required))?;
    if let Some(description) = features.description() {
        instance = instance.with_description(description);
    }
    if let Some(name) = features.reference_name() {
        instance = instance.with_reference_name(name);
    }
    Ok(instance)
}

fn prediction_response_schema(prediction: Option<ApiObject>, batch_prediction: bool) -> ApiObject {
    let record = ApiObject::object([
        (cn::ID, ApiObject::integer()),
        (cn::PREDICTION, prediction.unwrap_or_else(ApiObject::number)),
    ]);
    let predictions = if batch_prediction {
        ApiObject::array(record)
    } else {
        record
    };
    ApiObject::object([
        (cn::REQUEST_ID, schema::request_id()),
        (cn::MODEL_CONTEXT, schema::model_context()),
        (cn::PREDICTIONS, predictions),
    ])
    .requiring(&[cn::MODEL_CONTEXT, cn::PREDICTIONS])
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use actix_web::http::StatusCode;
    use bytes::Bytes;

    use super::*;
    use crate::batch::Table;
    use crate::config::ResponseConfig;
    use crate::error::ErrorKind;

    fn plus_one(batch: &Batch) -> anyhow::Result<Vec<Value>> {
        batch
            .column("x")
            .into_iter()
            .map(|x| {
                x.as_i64()
                    .map(|x| json!(x + 1))
                    .ok_or_else(|| anyhow::anyhow!("x is not an integer"))
            })
            .collect()
    }

    fn times_ten(batch: &Batch) -> anyhow::Result<Vec<Value>> {
        Ok(batch
            .column("x")
            .into_iter()
            .map(|x| json!(x.as_i64().unwrap_or_default() * 10))
            .collect())
    }

    fn features() -> ApiObject {
        ApiObject::object([("x", ApiObject::integer()), ("y", ApiObject::number())])
            .with_required(Required::Subset(vec!["x".to_string()]))
            .unwrap()
    }

    fn post(body: &str) -> RequestContext {
        RequestContext::new(Method::POST, "req-1", Bytes::from(body.to_string()))
    }

    fn run(service: &PredictionService, body: &str) -> ApiResult<(StatusCode, Value)> {
        service.handle(&post(body), &ResponseConfig::default())
    }

    #[test]
    fn test_instance_end_to_end() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .build(&registry)
            .unwrap();
        let (status, payload) = run(&service, r#"{"id": 7, "x": 4}"#).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["predictions"], json!({"id": 7, "prediction": 5}));
        assert_eq!(payload["request_id"], "req-1");
        assert_eq!(service.id(), "/m/v1/prediction");
    }

    #[test]
    fn test_batch_end_to_end() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), times_ten)
            .batch_prediction(true)
            .build(&registry)
            .unwrap();
        let (_, payload) = run(&service, r#"[{"id":1,"x":1},{"id":2,"x":2}]"#).unwrap();
        assert_eq!(
            payload["predictions"],
            json!([{"id": 1, "prediction": 10}, {"id": 2, "prediction": 20}])
        );
    }

    #[test]
    fn test_empty_batch_skips_the_model() {
        let registry = IdRegistry::new();
        let model = |_: &Batch| -> anyhow::Result<Vec<Value>> { anyhow::bail!("called") };
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), model)
            .batch_prediction(true)
            .build(&registry)
            .unwrap();
        let (_, payload) = run(&service, "[]").unwrap();
        assert_eq!(payload["predictions"], json!([]));
    }

    #[test]
    fn test_payload_shape_errors() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .build(&registry)
            .unwrap();
        let err = run(&service, r#"[{"id": 1, "x": 1}]"#).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = run(&service, "not json").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_schema_validation() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(
            ServiceDefinition::new("m", "v1").with_validate_request_data(true),
            times_ten,
        )
        .batch_prediction(true)
        .feature_schema(features())
        .build(&registry)
        .unwrap();
        let err = run(&service, r#"[{"id": 1, "x": "one"}]"#).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.messages(),
            vec!["Schema validation failed: data[0].x must be integer".to_string()]
        );
    }

    #[test]
    fn test_missing_fields_are_named() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(
            ServiceDefinition::new("m", "v1").with_validate_request_data(false),
            times_ten,
        )
        .batch_prediction(true)
        .feature_schema(features())
        .build(&registry)
        .unwrap();
        let err = run(&service, r#"[{"y": 1.5}]"#).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingRequiredFields {
                fields: vec!["id".to_string(), "x".to_string()]
            }
        );
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_null_fields_named_unless_allowed() {
        let registry = IdRegistry::new();
        let build = |allow_nulls: bool, name: &str| {
            PredictionService::builder(
                ServiceDefinition::new(name, "v1").with_validate_request_data(false),
                times_ten,
            )
            .batch_prediction(true)
            .allow_nulls(allow_nulls)
            .feature_schema(features())
            .build(&registry)
            .unwrap()
        };
        let body = r#"[{"id": 1, "x": 1}, {"id": 2, "x": null}]"#;

        let strict = build(false, "strict");
        let err = run(&strict, body).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::NullValuesPresent {
                fields: vec!["x".to_string()]
            }
        );

        let lenient = build(true, "lenient");
        let (_, payload) = run(&lenient, body).unwrap();
        assert_eq!(
            payload["predictions"],
            json!([{"id": 1, "prediction": 10}, {"id": 2, "prediction": 0}])
        );
    }

    #[test]
    fn test_checks_and_preprocessing_see_only_features() {
        let registry = IdRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_checks = seen.clone();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), times_ten)
            .batch_prediction(true)
            .feature_schema(features())
            .additional_checks(move |batch: &Batch| {
                seen_by_checks
                    .lock()
                    .unwrap()
                    .push(batch.columns().to_vec());
                Ok(())
            })
            .preprocessor(|batch: Batch| -> anyhow::Result<Batch> {
                anyhow::ensure!(!batch.has_column("extra"), "extra column leaked");
                anyhow::ensure!(!batch.has_column("id"), "id leaked");
                Ok(batch)
            })
            .build(&registry)
            .unwrap();
        let (_, payload) = run(&service, r#"[{"id": 3, "x": 2, "y": 0.5, "extra": true}]"#).unwrap();
        assert_eq!(payload["predictions"], json!([{"id": 3, "prediction": 20}]));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec!["x".to_string(), "y".to_string()]]
        );
    }

    #[test]
    fn test_additional_checks_reject() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .feature_schema(features())
            .additional_checks(|batch: &Batch| {
                anyhow::ensure!(
                    batch.value(0, "x").as_i64().unwrap_or_default() >= 0,
                    "x must be non-negative"
                );
                Ok(())
            })
            .build(&registry)
            .unwrap();
        let err = run(&service, r#"{"id": 1, "x": -1}"#).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UserCheckFailed {
                message: "x must be non-negative".to_string()
            }
        );
        assert_eq!(err.model_context().unwrap().model_name, "m");
    }

    #[test]
    fn test_postprocessor_gets_input_and_preprocessed() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), times_ten)
            .batch_prediction(true)
            .preprocessor(|batch: Batch| -> anyhow::Result<Batch> {
                let rows = batch
                    .into_records()
                    .into_iter()
                    .map(|mut row| {
                        row.insert("x".to_string(), json!(row["x"].as_i64().unwrap_or_default() * 2));
                        row
                    })
                    .collect();
                Ok(Batch::from_records(rows))
            })
            .postprocessor(
                |input: &Batch, preprocessed: &Batch, preds: Vec<Value>| -> anyhow::Result<Vec<Value>> {
                    Ok(preds
                        .into_iter()
                        .enumerate()
                        .map(|(i, p)| {
                            json!({
                                "raw": input.value(i, "x"),
                                "scaled": preprocessed.value(i, "x"),
                                "score": p,
                            })
                        })
                        .collect())
                },
            )
            .build(&registry)
            .unwrap();
        let (_, payload) = run(&service, r#"[{"id": 1, "x": 3}]"#).unwrap();
        assert_eq!(
            payload["predictions"][0]["prediction"],
            json!({"raw": 3, "scaled": 6, "score": 60})
        );
    }

    #[test]
    fn test_postprocessor_sees_unprojected_input() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), times_ten)
            .batch_prediction(true)
            .feature_schema(features())
            .postprocessor(
                |input: &Batch, preprocessed: &Batch, preds: Vec<Value>| -> anyhow::Result<Vec<Value>> {
                    anyhow::ensure!(!preprocessed.has_column("note"), "note leaked to the model");
                    Ok(preds
                        .into_iter()
                        .enumerate()
                        .map(|(i, p)| {
                            json!({
                                "id": input.value(i, "id"),
                                "note": input.value(i, "note"),
                                "score": p,
                            })
                        })
                        .collect())
                },
            )
            .build(&registry)
            .unwrap();
        let (_, payload) = run(&service, r#"[{"id": 11, "x": 1, "note": "a"}]"#).unwrap();
        assert_eq!(
            payload["predictions"],
            json!([{"id": 11, "prediction": {"id": 11, "note": "a", "score": 10}}])
        );
    }

    #[test]
    fn test_model_failures_are_contained() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .build(&registry)
            .unwrap();
        let err = run(&service, r#"{"id": 1, "x": "four"}"#).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ComputationFailed);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.traceback().unwrap().contains("x is not an integer"));
    }

    #[test]
    fn test_prediction_count_must_match_rows() {
        let registry = IdRegistry::new();
        let model = |_: &Batch| -> anyhow::Result<Vec<Value>> { Ok(vec![json!(1)]) };
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), model)
            .batch_prediction(true)
            .build(&registry)
            .unwrap();
        let err = run(&service, r#"[{"id": 1}, {"id": 2}]"#).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ComputationFailed);
    }

    #[test]
    fn test_get_and_other_methods() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .build(&registry)
            .unwrap();
        let ctx = RequestContext::new(Method::GET, "req-1", Bytes::new());
        let (status, payload) = service.handle(&ctx, &ResponseConfig::default()).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload, json!(LIVENESS_MESSAGE));

        let ctx = RequestContext::new(Method::PUT, "req-1", Bytes::new());
        let err = service.handle(&ctx, &ResponseConfig::default()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_request_schema_injects_id() {
        let registry = IdRegistry::new();
        let named = features().with_reference_name("Features");
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .feature_schema(named)
            .build(&registry)
            .unwrap();
        let request = service.core().request_schema(&Method::POST).unwrap();
        let (schema, refs) = request.api_obj.describe();
        let names: Vec<&String> = schema["properties"].as_object().unwrap().keys().collect();
        assert!(names.contains(&&"id".to_string()));
        assert_eq!(schema["required"], json!(["id", "x"]));
        assert!(refs.contains_key("Features"));
        assert_eq!(service.feature_columns().unwrap(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_feature_schema_must_be_an_object() {
        let registry = IdRegistry::new();
        let err = PredictionService::builder(ServiceDefinition::new("m", "v1"), plus_one)
            .feature_schema(ApiObject::array(ApiObject::number()))
            .build(&registry)
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidSchema { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_batch_response_schema_requires_array() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(ServiceDefinition::new("m", "v1"), times_ten)
            .batch_prediction(true)
            .build(&registry)
            .unwrap();
        let schema = &service.core().response_schema(&Method::POST, 200).unwrap().api_obj;
        let context = json!({"model_name": "m", "api_version": "v1", "model_meta": {}});
        assert!(schema
            .validate(&json!({
                "model_context": context,
                "predictions": [{"id": 1, "prediction": 10}, {"id": 2, "prediction": 20}]
            }))
            .is_ok());
        assert!(schema
            .validate(&json!({
                "model_context": context,
                "predictions": {"id": 1, "prediction": 10}
            }))
            .is_err());
    }

    #[test]
    fn test_response_validation_passes_for_conforming_output() {
        let registry = IdRegistry::new();
        let service = PredictionService::builder(
            ServiceDefinition::new("m", "v1").with_validate_response_data(true),
            times_ten,
        )
        .batch_prediction(true)
        .prediction_schema(ApiObject::integer())
        .build(&registry)
        .unwrap();
        assert!(run(&service, r#"[{"id": 1, "x": 1}]"#).is_ok());
    }
}
