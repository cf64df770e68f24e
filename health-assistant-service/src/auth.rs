//! Credential store and bearer-token sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "user@example.com";
pub const DEMO_PASSWORD: &str = "password123";
pub const DEMO_DISPLAY_NAME: &str = "Demo User";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing or unknown session token")]
    Unauthorized,

    #[error("Invalid signup: {0}")]
    Invalid(String),

    #[error("User store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

/// An account as persisted, with its salted password hash.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub salt: String,
    pub password_hash: String,
}

impl StoredUser {
    pub fn new(email: &str, password: &str, display_name: &str) -> Result<Self, AuthError> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AuthError::Invalid("email address is malformed".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Invalid("password must not be empty".to_string()));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::Invalid("display name must not be empty".to_string()));
        }

        let salt = Uuid::new_v4().simple().to_string();
        Ok(Self {
            password_hash: hash_password(&salt, password),
            salt,
            user: User {
                uid: Uuid::new_v4().to_string(),
                email,
                display_name: display_name.to_string(),
            },
        })
    }

    pub fn demo() -> Result<Self, AuthError> {
        Self::new(DEMO_EMAIL, DEMO_PASSWORD, DEMO_DISPLAY_NAME)
    }

    pub fn password_matches(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Account storage, keyed by normalized email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, email: &str) -> Result<Option<StoredUser>, AuthError>;

    /// Insert a new account. Fails with [`AuthError::EmailTaken`] if the
    /// email is already registered.
    async fn put(&self, user: StoredUser) -> Result<(), AuthError>;

    async fn verify(&self, email: &str, password: &str) -> Result<User, AuthError> {
        match self.get(&normalize_email(email)).await? {
            Some(stored) if stored.password_matches(password) => Ok(stored.user),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

pub struct InMemoryUserStore {
    users: Arc<DashMap<String, StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
        }
    }

    /// Store pre-seeded with the demo account.
    pub fn with_demo_user() -> Result<Self, AuthError> {
        let store = Self::new();
        let demo = StoredUser::demo()?;
        store.users.insert(demo.user.email.clone(), demo);
        Ok(store)
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, email: &str) -> Result<Option<StoredUser>, AuthError> {
        Ok(self.users.get(email).map(|entry| entry.clone()))
    }

    async fn put(&self, user: StoredUser) -> Result<(), AuthError> {
        // entry() holds the shard lock, so concurrent signups for one email
        // cannot both succeed.
        match self.users.entry(user.user.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::EmailTaken),
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }
}

pub struct PostgresUserStore {
    pool: sqlx::PgPool,
}

impl PostgresUserStore {
    pub async fn connect(database_url: &str) -> Result<Self, AuthError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                uid TEXT NOT NULL,
                display_name TEXT NOT NULL,
                salt TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&pool)
        .await?;

        let store = Self { pool };
        match store.put(StoredUser::demo()?).await {
            Ok(()) => info!("Seeded demo account"),
            Err(AuthError::EmailTaken) => debug!("Demo account already present"),
            Err(e) => return Err(e),
        }
        Ok(store)
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get(&self, email: &str) -> Result<Option<StoredUser>, AuthError> {
        let row = sqlx::query_as::<_, (String, String, String, String, String)>(
            "SELECT email, uid, display_name, salt, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(email, uid, display_name, salt, password_hash)| StoredUser {
            user: User {
                uid,
                email,
                display_name,
            },
            salt,
            password_hash,
        }))
    }

    async fn put(&self, user: StoredUser) -> Result<(), AuthError> {
        let result = sqlx::query(
            "INSERT INTO users (email, uid, display_name, salt, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(&user.user.email)
        .bind(&user.user.uid)
        .bind(&user.user.display_name)
        .bind(&user.salt)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::EmailTaken);
        }
        Ok(())
    }
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct Session {
    user: User,
    issued_at: DateTime<Utc>,
}

/// Live login sessions, token → user. Sessions expire `ttl` after login.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: User) -> String {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !self.is_expired(session, now));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, "Evicted expired sessions");
        }

        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user,
                issued_at: now,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<User> {
        let now = Utc::now();
        {
            let session = self.sessions.get(token)?;
            if !self.is_expired(&session, now) {
                return Some(session.user.clone());
            }
        }
        if self
            .sessions
            .remove_if(token, |_, session| self.is_expired(session, now))
            .is_some()
        {
            debug!("Session expired");
        }
        None
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        // A clock step backwards yields a negative age: treat as fresh.
        (now - session.issued_at)
            .to_std()
            .is_ok_and(|age| age >= self.ttl)
    }
}
