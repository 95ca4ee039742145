//! The application root: registered services, aggregate health and the
//! OpenAPI document.

use std::collections::BTreeSet;
use std::sync::Arc;

use actix_web::http::StatusCode;
use serde_json::{Map, Value, json};

use crate::config::AppConfig;
use crate::constants as cn;
use crate::error::{DefinitionError, DefinitionResult};
use crate::schema::{self, OpenApiSpec, ResponseSchema};
use crate::service::{IdRegistry, Service};

pub struct ModelApp {
    config: AppConfig,
    registry: Arc<IdRegistry>,
    services: Vec<Arc<dyn Service>>,
    deployed_on: String,
}

impl ModelApp {
    pub fn new(config: AppConfig) -> Self {
        Self::with_registry(config, Arc::new(IdRegistry::new()))
    }

    /// Use an existing id registry, e.g. one shared between test apps.
    pub fn with_registry(config: AppConfig, registry: Arc<IdRegistry>) -> Self {
        Self {
            config,
            registry,
            services: Vec::new(),
            deployed_on: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry services for this app must be built with.
    pub fn id_registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn add_service<S: Service + 'static>(&mut self, service: S) -> DefinitionResult<()> {
        self.add_services(vec![Arc::new(service) as Arc<dyn Service>])
    }

    /// Add every service or none of them.
    pub fn add_services(&mut self, services: Vec<Arc<dyn Service>>) -> DefinitionResult<()> {
        let mut seen: BTreeSet<&str> = self.services.iter().map(|s| s.id()).collect();
        for service in &services {
            if !seen.insert(service.id()) {
                return Err(DefinitionError::DuplicateIdentifier {
                    id: service.id().to_string(),
                });
            }
        }
        for service in services {
            log::info!("Registered service {}", service.id());
            self.services.push(service);
        }
        Ok(())
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Service>> {
        self.services.iter().find(|s| s.id() == id)
    }

    pub fn app_state(&self) -> Value {
        let services: Map<String, Value> = self
            .services
            .iter()
            .map(|s| (s.id().to_string(), s.core().health(&s.status())))
            .collect();
        json!({
            cn::APP_NAME: self.config.name,
            cn::APP_VERSION: self.config.version,
            cn::DEPLOYED_ON: self.deployed_on,
            cn::APP_META: self.config.meta,
            cn::SERVICES: services,
        })
    }

    pub fn liveness(&self) -> (StatusCode, Value) {
        (StatusCode::OK, self.app_state())
    }

    pub fn is_ready(&self) -> bool {
        !self.services.is_empty() && self.services.iter().all(|s| s.is_ready())
    }

    pub fn readiness(&self) -> (StatusCode, Value) {
        let status = if self.is_ready() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, self.app_state())
    }

    /// OpenAPI 3 document covering every service and the health checks.
    pub fn openapi(&self) -> DefinitionResult<Value> {
        let mut spec = OpenApiSpec::new(
            &self.config.name,
            self.config.description.as_deref(),
            &self.config.version,
        );

        let alive = ResponseSchema::new(schema::health_check(), 200, None);
        let not_ready = ResponseSchema::new(schema::health_check(), 503, None);
        spec.add_operation(cn::LIVENESS_ENDPOINT, "GET", None, &[&alive], &["health"])?;
        spec.add_operation(
            cn::READINESS_ENDPOINT,
            "GET",
            None,
            &[&alive, &not_ready],
            &["health"],
        )?;

        for service in &self.services {
            let core = service.core();
            let requests = core.request_schemas();
            let responses = core.response_schemas();
            let methods: BTreeSet<&str> = requests
                .iter()
                .map(|(m, _)| m.as_str())
                .chain(responses.iter().map(|(m, _)| m.as_str()))
                .collect();
            for method in methods {
                let request = requests
                    .iter()
                    .find(|(m, _)| m.as_str() == method)
                    .map(|(_, r)| *r);
                let method_responses: Vec<&ResponseSchema> = responses
                    .iter()
                    .filter(|(m, _)| m.as_str() == method)
                    .map(|(_, r)| *r)
                    .collect();
                spec.add_operation(
                    core.endpoint(),
                    method,
                    request,
                    &method_responses,
                    &[core.name()],
                )?;
            }
        }
        Ok(spec.to_json())
    }
}

impl std::fmt::Debug for ModelApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelApp")
            .field("name", &self.config.name)
            .field(
                "services",
                &self.services.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
