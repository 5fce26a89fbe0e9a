//! Access control list middleware for the storefront payment server.
//! This middleware can be placed on any route or service.
//!
//! It resolves the request's actor identity from the trusted headers the auth layer installs, and checks it
//! against the required roles for the route. If the identity is present and carries the required roles, the
//! request continues. Otherwise a 401/403 response is returned. `SuperAdmin` passes every check.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use storefront_payment_engine::db_types::Role;

use crate::{
    auth::AuthContext,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
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
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
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
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let context = AuthContext::from_headers(req.headers()).map_err(|e| {
                log::debug!("🛂 Rejecting request without a usable actor identity: {e}");
                Error::from(ServerError::from(e))
            })?;
            if required_roles.iter().all(|role| context.has_role(*role)) {
                service.call(req).await
            } else {
                log::debug!(
                    "🛂 Actor {} lacks the required roles {:?} for {}",
                    context.actor.id,
                    required_roles,
                    req.path()
                );
                Err(Error::from(ServerError::from(AuthError::InsufficientPermissions(format!(
                    "{:?} required",
                    required_roles
                )))))
            }
        })
    }
}
