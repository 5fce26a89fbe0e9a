//! Request-scoped actor identity.
//!
//! Authentication itself lives outside this service: the auth layer in front of it validates the session and
//! installs the resolved identity in trusted headers. This module turns those headers into an [`AuthContext`] once
//! per request, which then travels explicitly into every mutation and audit entry. There is no process-wide cache
//! of who is who.
use std::future::{ready, Ready};

use actix_web::{http::header::HeaderMap, FromRequest, HttpRequest};
use storefront_payment_engine::db_types::{Actor, Role};

use crate::errors::{AuthError, ServerError};

/// Header carrying the authenticated actor id, e.g. `admin:alice`.
pub const ACTOR_HEADER: &str = "x-sps-actor";
/// Header carrying the actor's comma-separated roles, e.g. `read_all,write`.
pub const ROLES_HEADER: &str = "x-sps-roles";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub actor: Actor,
}

impl AuthContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let id = headers
            .get(ACTOR_HEADER)
            .ok_or(AuthError::MissingIdentity)?
            .to_str()
            .map_err(|e| AuthError::PoorlyFormedHeader(e.to_string()))?
            .trim()
            .to_string();
        if id.is_empty() {
            return Err(AuthError::MissingIdentity);
        }
        let roles = match headers.get(ROLES_HEADER) {
            None => Vec::new(),
            Some(value) => value
                .to_str()
                .map_err(|e| AuthError::PoorlyFormedHeader(e.to_string()))?
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<Role>())
                .collect::<Result<Vec<Role>, _>>()
                .map_err(|e| AuthError::PoorlyFormedHeader(e.to_string()))?,
        };
        Ok(Self { actor: Actor::admin(id, roles) })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.actor.roles.contains(&Role::SuperAdmin) || self.actor.roles.contains(&role)
    }
}

impl FromRequest for AuthContext {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Self::from_headers(req.headers()).map_err(ServerError::from))
    }
}
