//! User records and the in-memory credential store.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::RwLock;
use tracing::debug;

use super::password::PasswordHasher;
use crate::error::{AuthError, AuthResult};

/// A registered identity. The username is the immutable key.
#[derive(Clone)]
pub struct User {
    username: String,
    password_hash: String,
    role: String,
}

impl User {
    /// Hashes `password` and builds a record. CPU-bound; callers on an async
    /// runtime should run it on the blocking pool.
    pub fn new(
        username: impl Into<String>,
        password: &str,
        role: impl Into<String>,
        hasher: &PasswordHasher,
    ) -> AuthResult<Self> {
        Ok(Self {
            username: username.into(),
            password_hash: hasher.hash(password)?,
            role: role.into(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn is_correct_password(&self, password: &str) -> AuthResult<bool> {
        PasswordHasher::verify(password, &self.password_hash)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[tonic::async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Inserts a new user, failing with `DuplicateUser` if the name is taken.
    async fn save(&self, user: User) -> AuthResult<()>;

    /// Returns a copy of the stored user or `NotFound`.
    async fn find(&self, username: &str) -> AuthResult<User>;

    async fn count(&self) -> usize;
}

/// Process-local store. Readers share the lock; writers are serialized.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[tonic::async_trait]
impl UserStore for InMemoryUserStore {
    async fn save(&self, user: User) -> AuthResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(AuthError::DuplicateUser(user.username));
        }

        debug!(username = %user.username, role = %user.role, "User saved");
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn find(&self, username: &str) -> AuthResult<User> {
        self.users
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(AuthError::NotFound)
    }

    async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}
