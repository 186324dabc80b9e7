use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Hash(_)
            | AppError::Token(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            AppError::Validation(_) | AppError::InvalidBody(_) => error_codes::VALIDATION_ERROR,
            AppError::Unauthorized(_) => error_codes::AUTH_FAILED,
            AppError::Forbidden(_) => error_codes::PERMISSION_DENIED,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            AppError::RateLimited(_) => error_codes::RATE_LIMIT,
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    /// Message returned to the client. Server-side failures never leak their detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidBody(_) => "Corps JSON invalide".to_string(),
            _ if self.status().is_server_error() => "Erreur interne du serveur".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else if let AppError::InvalidBody(rejection) = &self {
            tracing::debug!(detail = %rejection.body_text(), "rejected request body");
        }
        (
            status,
            error_to_api_response::<()>(self.code(), self.public_message()),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_statuses() {
        assert_eq!(
            AppError::Validation("Code requis".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = AppError::Internal("connection refused on 10.0.0.3".into());
        assert_eq!(err.public_message(), "Erreur interne du serveur");
        assert_eq!(err.code(), error_codes::INTERNAL_ERROR);

        let err = AppError::NotFound("Produit introuvable".into());
        assert_eq!(err.public_message(), "Produit introuvable");
    }
}
