use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use porter_rs::datascience::{WrappedModel, WrappedTransformer};
use porter_rs::logging::{self, LoggingConfig};
use porter_rs::server::startup;
use porter_rs::{AppConfig, ModelApp, PredictionService, ServerConfig, ServiceDefinition};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(
        long,
        default_value = "127.0.0.1",
        help = "Host address to bind the server to"
    )]
    host: String,

    #[arg(long, default_value_t = 8000, help = "Port number to listen on")]
    port: u16,

    #[arg(long, help = "Path to a JSON model artifact")]
    model_path: PathBuf,

    #[arg(long, help = "Path to a JSON transform artifact applied before the model")]
    preprocessor_path: Option<PathBuf>,

    #[arg(long, help = "Service name, used in the endpoint and model context")]
    name: String,

    #[arg(long, default_value = "v1", help = "Service API version")]
    api_version: String,

    #[arg(long, default_value = "", help = "Namespace prefixed to the endpoint")]
    namespace: String,

    #[arg(long, help = "Accept a JSON array of instances instead of a single object")]
    batch_prediction: bool,

    #[arg(long, help = "Accept null values in required fields")]
    allow_nulls: bool,

    #[arg(long, help = "Log every request and response")]
    log_api_calls: bool,

    #[arg(
        long,
        help = "Validate incoming payloads against the feature schema derived from the model artifact"
    )]
    validate_request_data: bool,

    #[arg(
        long,
        help = "Validate outgoing payloads against their schemas (adds latency, for development)"
    )]
    validate_response_data: bool,

    #[arg(long, help = "Path to a JSON application config file")]
    app_config: Option<PathBuf>,

    #[arg(long, help = "Serve the OpenAPI document")]
    expose_docs: bool,

    #[arg(
        long,
        default_value = "info",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"],
        help = "Log level"
    )]
    log_level: String,

    #[arg(
        long,
        default_value_t = 256 * 1024 * 1024,
        help = "Maximum request body size in bytes"
    )]
    max_payload_size: usize,

    #[arg(long, help = "Number of HTTP worker threads")]
    workers: Option<usize>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Seconds between readiness summaries in the log (0 disables)"
    )]
    health_log_interval: u64,
}

impl Args {
    fn get_app_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.app_config {
            Some(path) => {
                let raw = std::fs::read(path)
                    .with_context(|| format!("failed to read app config {}", path.display()))?;
                serde_json::from_slice(&raw)
                    .with_context(|| format!("failed to parse app config {}", path.display()))?
            }
            None => AppConfig::default(),
        };
        if self.expose_docs {
            config.expose_docs = true;
        }
        config.validate()?;
        Ok(config)
    }

    fn get_server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            max_payload_size: self.max_payload_size,
            workers: self.workers,
            health_log_interval: self.health_log_interval,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init_logging(LoggingConfig {
        level: logging::parse_level(&args.log_level).unwrap_or(LevelFilter::Info),
        ..Default::default()
    });

    let mut app = ModelApp::new(args.get_app_config()?);

    let definition = ServiceDefinition::new(&args.name, &args.api_version)
        .with_namespace(&args.namespace)
        .with_log_api_calls(args.log_api_calls)
        .with_validate_request_data(args.validate_request_data)
        .with_validate_response_data(args.validate_response_data);
    let model = WrappedModel::from_file(&args.model_path)?;
    let feature_schema = model.feature_schema();
    if args.validate_request_data && feature_schema.is_none() {
        log::warn!(
            "Model artifact {} does not declare its features; request validation has no schema",
            args.model_path.display()
        );
    }
    let mut builder = PredictionService::builder(definition, model)
        .batch_prediction(args.batch_prediction)
        .allow_nulls(args.allow_nulls);
    if let Some(schema) = feature_schema {
        builder = builder.feature_schema(schema);
    }
    if let Some(path) = &args.preprocessor_path {
        builder = builder.preprocessor(WrappedTransformer::from_file(path)?);
    }
    let service = builder.build(app.id_registry())?;
    app.add_service(service)?;

    startup(args.get_server_config(), app).await
}
