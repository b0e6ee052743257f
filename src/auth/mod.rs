//! Authentication Module
//! Mission: Secure API access with JWT tokens and role-based gates

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use jwt::{JwtHandler, TokenError};
pub use middleware::{auth_middleware, role_middleware, AuthGate, RoleGate};
pub use models::{Identity, Role};
pub use user_store::{IdentityStore, UserStore};
