//! Schema engine: type descriptions, compiled validators and OpenAPI rendering

pub mod api_object;
pub mod openapi;
pub mod validator;

pub use api_object::{ApiObject, Required};
pub use openapi::{OpenApiSpec, RequestSchema, ResponseSchema};
pub use validator::{SchemaError, Validator};

use serde_json::{Map, Value};

use crate::constants as cn;

/// Named schemas collected while rendering, keyed by reference name.
pub type Refs = Map<String, Value>;

pub const REF_PREFIX: &str = "#/components/schemas/";

pub fn request_id() -> ApiObject {
    ApiObject::string().with_description("A unique ID for the request.")
}

/// Free-form metadata: any JSON object.
pub fn model_meta() -> ApiObject {
    ApiObject::object(Vec::<(String, ApiObject)>::new())
        .with_description("Additional meta data describing the service.")
}

pub fn model_context() -> ApiObject {
    ApiObject::object([
        (cn::MODEL_NAME, ApiObject::string().with_description("The name of the model.")),
        (
            cn::API_VERSION,
            ApiObject::string().with_description("The model API version."),
        ),
        (cn::MODEL_META, model_meta()),
    ])
    .with_reference_name("ModelContext")
}

fn error_body() -> ApiObject {
    ApiObject::object([
        (cn::ERROR_NAME, ApiObject::string().with_description("Name of the error.")),
        (
            cn::ERROR_MESSAGES,
            ApiObject::array(ApiObject::string()).with_description("Error messages."),
        ),
        (
            cn::ERROR_TRACEBACK,
            ApiObject::string().with_description("Traceback of the error, if enabled."),
        ),
        (
            cn::ERROR_USER_DATA,
            ApiObject::any()
                .with_description("The request payload that caused the error, if enabled."),
        ),
    ])
    .requiring(&[cn::ERROR_NAME])
}

/// Error envelope returned by services.
pub fn model_context_error() -> ApiObject {
    ApiObject::object([
        (cn::REQUEST_ID, request_id()),
        (cn::MODEL_CONTEXT, model_context()),
        (cn::ERROR, error_body()),
    ])
    .requiring(&[cn::ERROR])
    .with_reference_name("ModelContextError")
}

pub fn health_check() -> ApiObject {
    let service = ApiObject::object([
        (cn::MODEL_CONTEXT, model_context()),
        (cn::STATUS, ApiObject::string()),
        (cn::ENDPOINT, ApiObject::string()),
    ]);
    ApiObject::object([
        (cn::APP_NAME, ApiObject::string()),
        (cn::APP_VERSION, ApiObject::string()),
        (cn::DEPLOYED_ON, ApiObject::string()),
        (cn::APP_META, model_meta()),
        (cn::SERVICES, ApiObject::free_form(service)),
    ])
    .with_reference_name("HealthCheck")
}
