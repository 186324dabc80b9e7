use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::CookieJar,
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};

use crate::{AppState, config::Config, error::AppError, utils::Claims, utils::verify_token};

pub const CART_SESSION_HEADER: &str = "x-cart-session";
pub const CART_SESSION_COOKIE: &str = "cart_session";

/// Decodes the bearer token of a request, if any. Invalid or expired tokens yield `None`.
pub fn claims_from_headers(headers: &HeaderMap, config: &Config) -> Option<Claims> {
    let bearer = headers.typed_get::<Authorization<Bearer>>()?;
    match verify_token(bearer.token(), config) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Requires a valid bearer token and exposes its claims as an `Extension<Claims>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = claims_from_headers(req.headers(), &state.config)
        .ok_or_else(|| AppError::Unauthorized("Authentification requise".into()))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Must run after `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin => Ok(next.run(req).await),
        Some(claims) => {
            tracing::warn!("Non-admin user {} denied admin access", claims.sub);
            Err(AppError::Forbidden("Non autorisé".into()))
        }
        None => Err(AppError::Unauthorized("Authentification requise".into())),
    }
}

/// Owner of a shopping cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(i32),
    Session(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<i32> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Session(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Session(sid) => Some(sid),
        }
    }
}

/// Cart identity of the caller: an authenticated user wins over an anonymous
/// cart session (header first, then cookie).
#[derive(Debug, Clone)]
pub struct CartIdentity(pub Option<CartOwner>);

impl CartIdentity {
    pub fn resolve(headers: &HeaderMap, config: &Config) -> Self {
        if let Some(Ok(user_id)) = claims_from_headers(headers, config).map(|c| c.user_id()) {
            return Self(Some(CartOwner::User(user_id)));
        }

        let from_header = headers
            .get(CART_SESSION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let session = from_header.or_else(|| {
            CookieJar::from_headers(headers)
                .get(CART_SESSION_COOKIE)
                .map(|c| c.value().trim().to_string())
                .filter(|s| !s.is_empty())
        });

        Self(session.map(CartOwner::Session))
    }

    /// Mutating cart operations need an owner.
    pub fn require(self, message: &str) -> Result<CartOwner, AppError> {
        self.0.ok_or_else(|| AppError::Validation(message.to_string()))
    }
}

impl FromRequestParts<AppState> for CartIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(&parts.headers, &state.config))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header};

    use super::*;
    use crate::utils::generate_token;

    fn config() -> Config {
        Config::new("postgres://localhost/shop", "middleware-secret")
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    #[test]
    fn bearer_user_takes_priority_over_session() {
        let config = config();
        let (token, _) = generate_token(7, "u@dz.dz", false, &config).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer(&token));
        headers.insert(CART_SESSION_HEADER, HeaderValue::from_static("s_abc"));

        let identity = CartIdentity::resolve(&headers, &config);
        assert_eq!(identity.0, Some(CartOwner::User(7)));
    }

    #[test]
    fn session_header_then_cookie() {
        let config = config();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("cart_session=s_cookie"));
        assert_eq!(
            CartIdentity::resolve(&headers, &config).0,
            Some(CartOwner::Session("s_cookie".into()))
        );

        headers.insert(CART_SESSION_HEADER, HeaderValue::from_static("s_header"));
        assert_eq!(
            CartIdentity::resolve(&headers, &config).0,
            Some(CartOwner::Session("s_header".into()))
        );
    }

    #[test]
    fn invalid_token_falls_back_to_session() {
        let config = config();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer("not-a-jwt"));
        headers.insert(CART_SESSION_HEADER, HeaderValue::from_static("s_1"));
        assert_eq!(
            CartIdentity::resolve(&headers, &config).0,
            Some(CartOwner::Session("s_1".into()))
        );
    }

    #[test]
    fn no_identity_is_rejected_for_mutations() {
        let identity = CartIdentity::resolve(&HeaderMap::new(), &config());
        assert!(identity.0.is_none());
        let err = identity.require("Panier requis").unwrap_err();
        assert_eq!(err.to_string(), "Panier requis");
    }

    #[test]
    fn blank_session_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(CART_SESSION_HEADER, HeaderValue::from_static("   "));
        assert!(CartIdentity::resolve(&headers, &config()).0.is_none());
    }
}
