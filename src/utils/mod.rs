use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // 用户ID
    pub email: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i32, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Jeton invalide".into()))
    }
}

pub fn generate_token(
    user_id: i32,
    email: &str,
    is_admin: bool,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + chrono::Duration::seconds(config.jwt_expiration().as_secs() as i64))
        .timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        is_admin,
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub resp_data: Option<T>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

/// JSON body extractor whose rejection is rendered through [`AppError`],
/// so malformed payloads get the usual envelope instead of axum's plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Storefront locale. Anything other than Arabic falls back to French.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    Fr,
    Ar,
}

impl Lang {
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.to_ascii_lowercase().starts_with("ar") => Lang::Ar,
            _ => Lang::Fr,
        }
    }

    /// Picks the localized text, falling back to French when the Arabic one is missing.
    pub fn pick<'a>(self, fr: &'a str, ar: Option<&'a str>) -> &'a str {
        match (self, ar.map(str::trim)) {
            (Lang::Ar, Some(ar)) if !ar.is_empty() => ar,
            _ => fr,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

impl LangQuery {
    pub fn lang(&self) -> Lang {
        Lang::from_param(self.lang.as_deref())
    }
}

/// Splits a comma-delimited option list, dropping blanks.
pub fn split_options(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Trims a free-text field, mapping blanks to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, StatusCode, header::CONTENT_TYPE},
    };

    fn config() -> Config {
        Config::new("postgres://localhost/shop", "unit-test-secret")
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("s3cret").unwrap();
        assert!(verify_password("s3cret", &hashed).unwrap());
        assert!(!verify_password("other", &hashed).unwrap());
    }

    #[test]
    fn token_round_trips_identity() {
        let config = config();
        let (token, exp) = generate_token(42, "a@b.dz", true, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.email, "a@b.dz");
        assert!(claims.is_admin);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let (token, _) = generate_token(1, "a@b.dz", false, &config()).unwrap();
        let other = Config::new("postgres://localhost/shop", "another-secret");
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn lang_selection() {
        assert_eq!(Lang::from_param(Some("ar")), Lang::Ar);
        assert_eq!(Lang::from_param(Some("AR-dz")), Lang::Ar);
        assert_eq!(Lang::from_param(Some("fr")), Lang::Fr);
        assert_eq!(Lang::from_param(Some("en")), Lang::Fr);
        assert_eq!(Lang::from_param(None), Lang::Fr);
    }

    #[test]
    fn arabic_falls_back_to_french() {
        assert_eq!(Lang::Ar.pick("Veste", Some("سترة")), "سترة");
        assert_eq!(Lang::Ar.pick("Veste", Some("  ")), "Veste");
        assert_eq!(Lang::Ar.pick("Veste", None), "Veste");
        assert_eq!(Lang::Fr.pick("Veste", Some("سترة")), "Veste");
    }

    #[test]
    fn options_are_trimmed_and_blank_free() {
        assert_eq!(
            split_options(Some(" S, M,,L ,")),
            vec!["S".to_string(), "M".to_string(), "L".to_string()]
        );
        assert!(split_options(None).is_empty());
        assert!(split_options(Some("")).is_empty());
    }

    #[test]
    fn non_blank_maps_empty_to_none() {
        assert_eq!(non_blank(Some("  M ")), Some("M".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[derive(Debug, Deserialize)]
    struct Quantity {
        quantity: i32,
    }

    fn json_request(body: &'static str) -> Request {
        http::Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn json_body_extracts_payload() {
        let JsonBody(parsed) = JsonBody::<Quantity>::from_request(json_request(r#"{"quantity":3}"#), &())
            .await
            .unwrap();
        assert_eq!(parsed.quantity, 3);
    }

    #[tokio::test]
    async fn mistyped_body_is_a_validation_error() {
        let err = JsonBody::<Quantity>::from_request(json_request(r#"{"quantity":"deux"}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), error_codes::VALIDATION_ERROR);
        assert_eq!(err.public_message(), "Corps JSON invalide");
    }
}
