//! Authentication Middleware
//! Mission: Protect API endpoints with bearer-token validation and role checks

use crate::auth::{
    jwt::JwtHandler,
    models::{Identity, Role},
    user_store::IdentityStore,
};
use crate::errors::GateError;
use anyhow::anyhow;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything the authentication gate needs to turn a header into an identity.
#[derive(Clone)]
pub struct AuthGate {
    jwt_handler: Arc<JwtHandler>,
    identities: Arc<dyn IdentityStore>,
    lookup_timeout: Duration,
}

impl AuthGate {
    pub fn new(jwt_handler: Arc<JwtHandler>, identities: Arc<dyn IdentityStore>) -> Self {
        Self {
            jwt_handler,
            identities,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Resolve the request's bearer token to a stored identity.
    ///
    /// Missing, malformed, expired, and foreign-signed tokens all collapse to
    /// `Unauthenticated`, as does a token whose subject no longer exists.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, GateError> {
        let token = bearer_token(headers).ok_or_else(|| {
            debug!("Request without bearer token");
            GateError::Unauthenticated
        })?;

        let claims = self.jwt_handler.verify(token).map_err(|reason| {
            debug!(%reason, "Bearer token rejected");
            GateError::Unauthenticated
        })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            warn!("Signed token carries a non-UUID subject");
            GateError::Unauthenticated
        })?;

        let lookup = self.identities.find_identity(&user_id);
        let identity = tokio::time::timeout(self.lookup_timeout, lookup)
            .await
            .map_err(|_| {
                GateError::LookupFault(anyhow!(
                    "identity lookup for {} timed out after {:?}",
                    user_id,
                    self.lookup_timeout
                ))
            })?
            .map_err(GateError::LookupFault)?;

        identity.ok_or_else(|| {
            debug!(%user_id, "Token subject no longer exists");
            GateError::Unauthenticated
        })
    }
}

/// Token from `Authorization: Bearer <token>`. The scheme is case-sensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Auth middleware that validates the bearer token and attaches the identity
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let identity = gate.authenticate(req.headers()).await?;

    // Add identity to request extensions so handlers can access it
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extract identity from request (use after auth middleware)
pub fn extract_identity(req: &Request) -> Option<&Identity> {
    req.extensions().get::<Identity>()
}

/// Roles a route accepts. Fixed when the route is registered.
#[derive(Debug, Clone)]
pub struct RoleGate {
    accepted_roles: HashSet<Role>,
}

impl RoleGate {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            accepted_roles: roles.into_iter().collect(),
        }
    }

    pub fn admin_only() -> Self {
        Self::new([Role::Admin])
    }

    pub fn check(&self, identity: &Identity) -> bool {
        self.accepted_roles.contains(&identity.role)
    }
}

/// Role middleware. Must run after `auth_middleware`; a request with no
/// identity attached is refused.
pub async fn role_middleware(
    State(gate): State<Arc<RoleGate>>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    match extract_identity(&req) {
        Some(identity) if gate.check(identity) => Ok(next.run(req).await),
        Some(identity) => {
            warn!(
                user_id = %identity.id,
                role = identity.role.as_str(),
                path = %req.uri().path(),
                "Role not permitted for route"
            );
            Err(GateError::Unauthorized)
        }
        None => {
            warn!(path = %req.uri().path(), "Role check reached without an identity");
            Err(GateError::Unauthorized)
        }
    }
}
