mod auth;
mod cors;
mod error_handler;
mod rate_limit;

pub use auth::{
    CART_SESSION_COOKIE, CART_SESSION_HEADER, CartIdentity, CartOwner, admin_middleware,
    auth_middleware, claims_from_headers,
};
pub use cors::cors_layer;
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, rate_limit};
