//! User Storage
//! Mission: Store user accounts in SQLite and resolve token subjects to identities

use crate::auth::models::{Identity, Role, User};
use crate::db::{self, SharedConnection};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Resolves a token subject to the identity it names.
///
/// `Ok(None)` means the subject no longer exists; `Err` is a lookup fault.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity(&self, id: &Uuid) -> Result<Option<Identity>>;
}

/// User storage with SQLite backend. Clones share the connection.
#[derive(Clone)]
pub struct UserStore {
    conn: SharedConnection,
    hash_cost: u32,
}

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

impl UserStore {
    /// Open (or create) the user database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(db::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    fn from_connection(conn: SharedConnection) -> Result<Self> {
        let store = Self {
            conn,
            hash_cost: DEFAULT_COST,
        };
        store.init_db()?;
        Ok(store)
    }

    /// Override the bcrypt cost (tests use the minimum to stay fast)
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Create the bootstrap admin account unless that username already exists
    pub fn ensure_admin(&self, username: &str, password: &str) -> Result<()> {
        if self.get_user_by_username(username)?.is_some() {
            return Ok(());
        }
        self.create_user(username, password, Role::Admin)?;
        info!("🔐 Bootstrap admin account created: {}", username);
        Ok(())
    }

    /// Create a new user
    pub fn create_user(&self, username: &str, password: &str, role: Role) -> Result<User> {
        let password_hash = hash(password, self.hash_cost).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            role,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.created_at,
            ],
        )
        .context("Failed to insert user")?;

        info!("✅ Created user: {} ({})", user.username, user.role.as_str());

        Ok(user)
    }

    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.to_string()],
                row_to_user,
            )
            .optional()
            .context("Failed to load user by id")?;
        Ok(user)
    }

    /// Get user by username
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                row_to_user,
            )
            .optional()
            .context("Failed to load user by username")?;
        Ok(user)
    }

    /// Check username and password; returns the user on a match
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        match self.get_user_by_username(username)? {
            Some(user) if self.check_password(&user, password)? => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    pub fn check_password(&self, user: &User, password: &str) -> Result<bool> {
        verify(password, &user.password_hash).context("Failed to verify password")
    }

    pub fn update_username(&self, id: &Uuid, username: &str) -> Result<Option<User>> {
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                params![username, id.to_string()],
            )
            .context("Failed to update username")?;
        }
        self.get_user_by_id(id)
    }

    pub fn update_password(&self, id: &Uuid, password: &str) -> Result<Option<User>> {
        let password_hash = hash(password, self.hash_cost).context("Failed to hash password")?;
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id.to_string()],
            )
            .context("Failed to update password")?;
        }
        self.get_user_by_id(id)
    }
}

#[async_trait]
impl IdentityStore for UserStore {
    async fn find_identity(&self, id: &Uuid) -> Result<Option<Identity>> {
        // SQLite and the connection lock block; keep them off the async workers
        let user = tokio::task::spawn_blocking({
            let store = self.clone();
            let id = *id;
            move || store.get_user_by_id(&id)
        })
        .await
        .context("Identity lookup task failed")??;

        Ok(user.map(|user| user.identity()))
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let role: String = row.get(3)?;
    Ok(User {
        id,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::parse(&role).unwrap_or(Role::User),
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{jwt::JwtHandler, middleware::AuthGate};
    use crate::errors::GateError;
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    fn create_test_store() -> UserStore {
        UserStore::in_memory().unwrap().with_hash_cost(4)
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let store = create_test_store();

        let user = store.create_user("alice", "password123", Role::User).unwrap();
        assert_eq!(user.role, Role::User);

        let by_name = store.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        let by_id = store.get_user_by_id(&user.id).unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let store = create_test_store();

        store.create_user("alice", "password123", Role::User).unwrap();
        assert!(store.create_user("alice", "other", Role::User).is_err());
    }

    #[test]
    fn test_authenticate() {
        let store = create_test_store();
        store.create_user("alice", "password123", Role::User).unwrap();

        assert!(store.authenticate("alice", "password123").unwrap().is_some());
        assert!(store.authenticate("alice", "wrong").unwrap().is_none());
        assert!(store.authenticate("nobody", "password123").unwrap().is_none());
    }

    #[test]
    fn test_update_username_and_password() {
        let store = create_test_store();
        let user = store.create_user("alice", "password123", Role::User).unwrap();

        let renamed = store.update_username(&user.id, "alicia").unwrap().unwrap();
        assert_eq!(renamed.username, "alicia");

        store.update_password(&user.id, "new-password").unwrap();
        assert!(store.authenticate("alicia", "new-password").unwrap().is_some());
        assert!(store.authenticate("alicia", "password123").unwrap().is_none());

        assert!(store
            .update_username(&Uuid::new_v4(), "ghost")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ensure_admin_is_idempotent() {
        let store = create_test_store();

        store.ensure_admin("admin", "admin-pass").unwrap();
        store.ensure_admin("admin", "admin-pass").unwrap();

        let admin = store.get_user_by_username("admin").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[test]
    fn test_persists_to_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let user_id = {
            let store = UserStore::new(temp_file.path()).unwrap().with_hash_cost(4);
            store.create_user("alice", "password123", Role::Admin).unwrap().id
        };

        let reopened = UserStore::new(temp_file.path()).unwrap();
        let user = reopened.get_user_by_id(&user_id).unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_find_identity() {
        let store = create_test_store();
        let user = store.create_user("alice", "password123", Role::Admin).unwrap();

        let identity = store.find_identity(&user.id).await.unwrap().unwrap();
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.role, Role::Admin);

        assert!(store.find_identity(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_busy_connection_trips_lookup_timeout() {
        let store = Arc::new(create_test_store());
        let user = store.create_user("alice", "password123", Role::Admin).unwrap();
        let jwt = Arc::new(JwtHandler::new("test-secret".to_string()));
        let (token, _) = jwt.sign(&user).unwrap();
        let gate = AuthGate::new(jwt, store.clone()).with_lookup_timeout(Duration::from_millis(50));

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let busy = store.conn.lock();
        let started = Instant::now();
        let result = gate.authenticate(&headers).await;
        assert!(matches!(result, Err(GateError::LookupFault(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(busy);

        let identity = gate.authenticate(&headers).await.unwrap();
        assert_eq!(identity, user.identity());
    }
}
