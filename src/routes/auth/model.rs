use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    utils::{hash_password, is_unique_violation, verify_password},
};

#[derive(Debug, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoogleLoginRequest {
    pub credential: Option<String>,
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserIdentity {
    pub id: i32,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_at: i64,
    pub user: UserIdentity,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserIdentity,
}

const USER_COLUMNS: &str = "id, email, password_hash, full_name, is_verified, verification_token, is_admin, created_at";

impl User {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await
    }

    /// Creates an unverified account and returns it with its verification token.
    /// The very first account of the shop becomes its admin.
    pub async fn register(
        pool: &PgPool,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> AppResult<(Self, String)> {
        let email = email.to_lowercase();
        if Self::find_by_email(pool, &email).await?.is_some() {
            return Err(AppError::Validation("Email déjà utilisé".into()));
        }

        let password_hash = hash_password(password)?;
        let token = Uuid::new_v4().to_string();

        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, verification_token, is_verified, is_admin)
            VALUES ($1, $2, $3, $4, FALSE, NOT EXISTS (SELECT 1 FROM users))
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&email)
        .bind(&password_hash)
        .bind(full_name)
        .bind(&token)
        .fetch_one(pool)
        .await;

        match result {
            Ok(user) => {
                tracing::info!("Registered user {} ({})", user.id, user.email);
                Ok((user, token))
            }
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Validation("Email déjà utilisé".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Consumes a verification token. Unknown or already-used tokens return `false`.
    pub async fn verify_email(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let verified: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_token = NULL
            WHERE verification_token = $1
            RETURNING id
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        if let Some(id) = verified {
            tracing::info!("User {} verified their email", id);
        }
        Ok(verified.is_some())
    }

    /// Password login. Unknown email and wrong password share the same message.
    pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> AppResult<Self> {
        let invalid = || AppError::Unauthorized("Email ou mot de passe incorrect".into());

        let user = Self::find_by_email(pool, email).await?.ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }
        if !user.is_verified {
            return Err(AppError::Unauthorized(
                "Veuillez vérifier votre email avant de vous connecter".into(),
            ));
        }

        Ok(user)
    }

    /// Google accounts are verified by Google, so they are created verified with a random password.
    pub async fn find_or_create_google(
        pool: &PgPool,
        email: &str,
        full_name: &str,
    ) -> AppResult<Self> {
        if let Some(user) = Self::find_by_email(pool, email).await? {
            return Ok(user);
        }

        let password_hash = hash_password(&Uuid::new_v4().simple().to_string())?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, is_verified, is_admin)
            VALUES ($1, $2, $3, TRUE, FALSE)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email.to_lowercase())
        .bind(password_hash)
        .bind(full_name)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created Google account {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Creates the configured admin account or resets its password and flags.
    pub async fn upsert_admin(pool: &PgPool, email: &str, password: &str) -> AppResult<Self> {
        let password_hash = hash_password(password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, is_verified, is_admin)
            VALUES ($1, $2, 'Admin', TRUE, TRUE)
            ON CONFLICT (email) DO UPDATE
            SET password_hash = EXCLUDED.password_hash, is_verified = TRUE, is_admin = TRUE
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email.to_lowercase())
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }
}
