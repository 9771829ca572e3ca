//! Request logging: one line per completed request with a correlation
//! id, source address, status and latency.

use std::rc::Rc;
use std::time::Instant;

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::jwt;
use futures::future::{LocalBoxFuture, Ready, ready};
use log::info;
use uuid::Uuid;

pub struct LoggerMiddleware {
    enabled: bool,
}

impl LoggerMiddleware {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
            enabled: self.enabled,
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
    enabled: bool,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let enabled = self.enabled;

        let method = req.method().to_string();
        let path = req.path().to_string();
        let ip = req
            .connection_info()
            .realip_remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let request_id = Uuid::new_v4();

        Box::pin(async move {
            let started = Instant::now();
            let res = srv.call(req).await?;

            if enabled {
                let user = jwt_user(&res);
                info!(
                    "{} {} {} {} {}ms req={} user={}",
                    ip,
                    method,
                    path,
                    res.status().as_u16(),
                    started.elapsed().as_millis(),
                    request_id,
                    user
                );
            }

            Ok(res)
        })
    }
}

fn jwt_user<B>(res: &ServiceResponse<B>) -> String {
    use actix_web::HttpMessage;
    res.request()
        .extensions()
        .get::<jwt::Principal>()
        .map(|principal| principal.user_id.to_string())
        .unwrap_or_else(|| "-".to_string())
}
