//! Access control middleware for the Campus Eats server.
//! This middleware can be placed on any route or service.
//!
//! It validates the bearer token in the `Authorization` header, stashes the verified [`JwtClaims`] in the request
//! extensions for handlers and then checks the caller's role against the roles allowed on the route. An empty
//! allow-list means any authenticated caller. Admin tokens pass every check.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized},
    web,
    Error,
    HttpMessage,
};
use campus_eats_engine::db_types::Role;
use futures::{
    future::{ok, Ready},
    Future,
};

use crate::{
    auth::{validate_token, JwtClaims},
    config::AuthConfig,
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let auth_config = req.app_data::<web::Data<AuthConfig>>().ok_or_else(|| {
                log::error!("No auth configuration found in app data");
                ErrorInternalServerError("No auth configuration found in app data")
            })?;
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| ErrorUnauthorized("No access token was provided."))?;
            let claims = validate_token(header, &auth_config.jwt_secret).map_err(|e| {
                log::debug!("🔑️ Token validation failed: {e}");
                ErrorUnauthorized("Access token is invalid.")
            })?;
            let permitted = allowed_roles.is_empty() ||
                claims.role == Role::Admin ||
                allowed_roles.contains(&claims.role);
            if permitted {
                req.extensions_mut().insert(claims);
                service.call(req).await
            } else {
                Err(ErrorForbidden("Insufficient permissions"))
            }
        })
    }
}
