//! User directory: lookup and mutation of user records
//!
//! The session layer only talks to the [`UserDirectory`] trait so that
//! tests can swap the Postgres implementation for an in-memory one.

use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{NewUser, Role, UpdateUser, User};

/// Failures raised by directory implementations
///
/// `NotFound` is internal to the service: callers of the session layer
/// never see it directly, it is always remapped to a domain failure.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,

    #[error("invalid stored record: {0}")]
    Data(String),

    #[error("directory backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Lookup and mutation of user records
pub trait UserDirectory: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = Result<User, DirectoryError>> + Send;

    fn get_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<User, DirectoryError>> + Send;

    fn create(&self, new_user: NewUser) -> impl Future<Output = Result<User, DirectoryError>> + Send;

    /// Apply a partial update and return the updated record
    fn update(
        &self,
        id: Uuid,
        update: UpdateUser,
    ) -> impl Future<Output = Result<User, DirectoryError>> + Send;
}

/// PostgreSQL-backed user directory
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, hashed_password, is_active, \
     role, two_fa_enabled, two_fa_code, two_fa_code_expiry, session_id, created_at, updated_at";

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &PgRow) -> Result<User, DirectoryError> {
    let role: String = row.get("role");
    let role = Role::from_str(&role).map_err(DirectoryError::Data)?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        hashed_password: row.get("hashed_password"),
        is_active: row.get("is_active"),
        role,
        two_fa_enabled: row.get("two_fa_enabled"),
        two_fa_code: row.get("two_fa_code"),
        two_fa_code_expiry: row.get("two_fa_code_expiry"),
        session_id: row.get("session_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl UserDirectory for PgUserDirectory {
    async fn get_by_id(&self, id: Uuid) -> Result<User, DirectoryError> {
        debug!("Looking up user by id: {}", id);

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_user(&row),
            None => Err(DirectoryError::NotFound),
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        debug!("Looking up user by email");

        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_user(&row),
            None => Err(DirectoryError::NotFound),
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, DirectoryError> {
        debug!("Creating user: {}", new_user.email);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, hashed_password, role, two_fa_enabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.hashed_password)
        .bind(new_user.role.as_str())
        .bind(new_user.two_fa_enabled)
        .fetch_one(&self.pool)
        .await?;

        row_to_user(&row)
    }

    async fn update(&self, id: Uuid, update: UpdateUser) -> Result<User, DirectoryError> {
        debug!("Updating user: {}", id);

        // One static statement: each nullable column pairs a "set it"
        // flag with the value so that clearing is distinct from keeping.
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                hashed_password = COALESCE($2, hashed_password),
                is_active = COALESCE($3, is_active),
                two_fa_code = CASE WHEN $4 THEN $5 ELSE two_fa_code END,
                two_fa_code_expiry = CASE WHEN $6 THEN $7 ELSE two_fa_code_expiry END,
                session_id = CASE WHEN $8 THEN $9 ELSE session_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.hashed_password)
        .bind(update.is_active)
        .bind(update.two_fa_code.is_some())
        .bind(update.two_fa_code.clone().flatten())
        .bind(update.two_fa_code_expiry.is_some())
        .bind(update.two_fa_code_expiry.flatten())
        .bind(update.session_id.is_some())
        .bind(update.session_id.flatten())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_user(&row),
            None => Err(DirectoryError::NotFound),
        }
    }
}
