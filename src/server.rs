use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    App, Error, HttpRequest, HttpResponse, HttpServer,
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::StatusCode,
    middleware::Logger,
    web,
};
use log::{error, info, warn};
use serde_json::Value;

use crate::app::ModelApp;
use crate::config::ServerConfig;
use crate::constants as cn;
use crate::envelope;
use crate::error::ApiError;
use crate::middleware::{RequestIdMiddleware, get_request_id};
use crate::service::{RequestContext, Service};

/// Shared state behind every route.
pub struct AppState {
    app: ModelApp,
    docs: Option<Value>,
}

impl AppState {
    /// Checks the configuration and renders the OpenAPI document once, so
    /// that a bad definition fails at startup instead of on first request.
    pub fn new(app: ModelApp) -> anyhow::Result<Self> {
        app.config().validate()?;
        let docs = if app.config().expose_docs {
            Some(app.openapi()?)
        } else {
            None
        };
        Ok(Self { app, docs })
    }

    pub fn app(&self) -> &ModelApp {
        &self.app
    }
}

fn json_response(status: StatusCode, body: Value) -> HttpResponse {
    HttpResponse::build(status).json(body)
}

fn error_response(
    state: &AppState,
    err: &ApiError,
    request_id: &str,
    user_data: Option<&Value>,
) -> HttpResponse {
    let payload = envelope::error_payload(
        err,
        &state.app.config().responses,
        Some(request_id),
        user_data,
    );
    json_response(err.status_code(), payload)
}

async fn service_handler(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
    service: web::Data<Arc<dyn Service>>,
) -> HttpResponse {
    let request_id = get_request_id(&req);
    let ctx = RequestContext::new(req.method().clone(), request_id.clone(), body);
    let config = state.app.config().responses.clone();
    let svc = Arc::clone(service.get_ref());
    let call_ctx = ctx.clone();

    match web::block(move || svc.handle(&call_ctx, &config)).await {
        Ok(Ok((status, payload))) => json_response(status, payload),
        Ok(Err(err)) => error_response(&state, &err, &request_id, Some(&ctx.request_data())),
        Err(blocking) => {
            error!("Service {} panicked: {}", service.id(), blocking);
            let err = ApiError::computation(anyhow::anyhow!("service panicked: {}", blocking))
                .with_model_context(service.core().model_context().clone());
            error_response(&state, &err, &request_id, Some(&ctx.request_data()))
        }
    }
}

async fn method_not_allowed(
    req: HttpRequest,
    state: web::Data<AppState>,
    service: Option<web::Data<Arc<dyn Service>>>,
) -> HttpResponse {
    let mut err = ApiError::method_not_allowed(req.method().as_str());
    if let Some(service) = service {
        err = err.with_model_context(service.core().model_context().clone());
    }
    error_response(&state, &err, &get_request_id(&req), None)
}

async fn not_found(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let err = ApiError::not_found(req.path());
    error_response(&state, &err, &get_request_id(&req), None)
}

async fn liveness(state: web::Data<AppState>) -> HttpResponse {
    let (status, body) = state.app.liveness();
    json_response(status, body)
}

async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let (status, body) = state.app.readiness();
    json_response(status, body)
}

async fn root(state: web::Data<AppState>) -> HttpResponse {
    let config = state.app.config();
    if config.expose_docs {
        return HttpResponse::Found()
            .insert_header(("Location", config.docs_json_url.as_str()))
            .finish();
    }
    HttpResponse::Ok().body("Send POST requests to /<model-name>/<api-version>/prediction")
}

async fn docs(state: web::Data<AppState>) -> HttpResponse {
    match &state.docs {
        Some(doc) => HttpResponse::Ok().json(doc),
        None => HttpResponse::NotFound().finish(),
    }
}

/// Build the application. Every registered service gets a resource at its
/// endpoint answering its methods; any other method gets a 405 envelope and
/// unknown paths a 404 envelope.
pub fn build_app(
    state: web::Data<AppState>,
    max_payload_size: usize,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let headers = state.app.config().request_id_headers.clone();
    let mut app = App::new()
        .app_data(state.clone())
        .app_data(web::PayloadConfig::default().limit(max_payload_size))
        .route(cn::LIVENESS_ENDPOINT, web::get().to(liveness))
        .route(cn::READINESS_ENDPOINT, web::get().to(readiness))
        .route(cn::ROOT_ENDPOINT, web::get().to(root));

    if state.docs.is_some() {
        app = app.route(&state.app.config().docs_json_url, web::get().to(docs));
    }

    for service in state.app.services() {
        let mut resource = web::resource(service.core().endpoint())
            .app_data(web::Data::new(Arc::clone(service)));
        for method in service.methods() {
            resource = resource.route(web::method(method).to(service_handler));
        }
        app = app.service(resource.default_service(web::to(method_not_allowed)));
    }

    app.default_service(web::to(not_found))
        .wrap(RequestIdMiddleware::new(headers))
        .wrap(Logger::default())
}

/// Log a one-line readiness summary every `interval_secs`.
pub async fn periodic_health_logging(state: web::Data<AppState>, interval_secs: u64) {
    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        let not_ready: Vec<&str> = state
            .app
            .services()
            .iter()
            .filter(|s| !s.is_ready())
            .map(|s| s.id())
            .collect();
        if not_ready.is_empty() && state.app.is_ready() {
            info!("{} services ready", state.app.services().len());
        } else {
            warn!(
                "App not ready: {} services, not ready: [{}]",
                state.app.services().len(),
                not_ready.join(", ")
            );
        }
    }
}

pub async fn startup(config: ServerConfig, app: ModelApp) -> anyhow::Result<()> {
    let state = web::Data::new(AppState::new(app)?);

    info!("Starting server at {}:{}", config.host, config.port);
    for service in state.app.services() {
        info!("Serving {} at {}", service.id(), service.core().endpoint());
    }
    if state.docs.is_some() {
        info!("OpenAPI document at {}", state.app.config().docs_json_url);
    }

    if config.health_log_interval > 0 {
        actix_web::rt::spawn(periodic_health_logging(
            state.clone(),
            config.health_log_interval,
        ));
    }

    let max_payload_size = config.max_payload_size;
    let mut server = HttpServer::new(move || build_app(state.clone(), max_payload_size))
        .bind((config.host.as_str(), config.port))?;
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }
    server.run().await?;
    Ok(())
}
