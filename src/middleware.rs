use std::future::{Ready, ready};

use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;

/// Request correlation id stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

const ID_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn generate_request_id() -> String {
    let random_part: String = (0..24)
        .filter_map(|_| {
            ID_CHARS
                .chars()
                .nth(rand::random::<u32>() as usize % ID_CHARS.len())
        })
        .collect();
    format!("req-{}", random_part)
}

/// Request id set by [`RequestIdMiddleware`], or a fresh one.
pub fn get_request_id(req: &HttpRequest) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(generate_request_id)
}

/// Takes the request id from the first configured header present, or
/// generates one.
pub struct RequestIdMiddleware {
    headers: Vec<String>,
}

impl RequestIdMiddleware {
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdMiddlewareService {
            service,
            headers: self.headers.clone(),
        }))
    }
}

pub struct RequestIdMiddlewareService<S> {
    service: S,
    headers: Vec<String>,
}

impl<S, B> Service<ServiceRequest> for RequestIdMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = self
            .headers
            .iter()
            .filter_map(|name| req.headers().get(name.as_str()))
            .find_map(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        req.extensions_mut().insert(RequestId(request_id));

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}
