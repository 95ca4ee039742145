pub mod app;
pub mod artifact;
pub mod batch;
pub mod config;
pub mod constants;
pub mod datascience;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod schema;
pub mod server;
pub mod service;

pub use app::ModelApp;
pub use config::{AppConfig, ResponseConfig, ServerConfig};
pub use envelope::{ModelContext, Response};
pub use error::{ApiError, ApiResult, DefinitionError, DefinitionResult, ErrorKind};
pub use schema::{ApiObject, Required};
pub use service::{
    IdRegistry, PredictionService, RequestContext, Service, ServiceDefinition,
};
