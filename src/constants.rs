//! Wire-level names shared by the envelope builder, the schemas and the
//! HTTP binding.

pub const REQUEST_ID: &str = "request_id";
pub const MODEL_CONTEXT: &str = "model_context";
pub const PREDICTIONS: &str = "predictions";
pub const ERROR: &str = "error";

pub const MODEL_NAME: &str = "model_name";
pub const API_VERSION: &str = "api_version";
pub const MODEL_META: &str = "model_meta";

/// Record keys inside `predictions`.
pub const ID: &str = "id";
pub const PREDICTION: &str = "prediction";

/// Keys inside `error`.
pub const ERROR_NAME: &str = "name";
pub const ERROR_MESSAGES: &str = "messages";
pub const ERROR_TRACEBACK: &str = "traceback";
pub const ERROR_USER_DATA: &str = "user_data";

/// Health check payload keys.
pub const APP_NAME: &str = "app_name";
pub const APP_VERSION: &str = "app_version";
pub const DEPLOYED_ON: &str = "deployed_on";
pub const APP_META: &str = "app_meta";
pub const SERVICES: &str = "services";
pub const STATUS: &str = "status";
pub const ENDPOINT: &str = "endpoint";

/// The canonical ready status. A service is ready only if its status equals
/// this value exactly.
pub const READY: &str = "READY";

pub const LIVENESS_ENDPOINT: &str = "/-/alive";
pub const READINESS_ENDPOINT: &str = "/-/ready";
pub const ROOT_ENDPOINT: &str = "/";

pub const PREDICTION_ACTION: &str = "prediction";

/// Meta keys that would shadow model context keys.
pub const RESERVED_META_KEYS: &[&str] = &[MODEL_NAME, API_VERSION, MODEL_META];
