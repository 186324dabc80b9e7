use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    middleware::{admin_middleware, auth_middleware},
    utils::{ApiResponse, success_to_api_response},
};

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod discount;
pub mod product;

async fn health() -> Json<ApiResponse<Value>> {
    success_to_api_response(json!({ "status": "ok" }))
}

/// Full API router, nested under the configured base URI.
pub fn router(state: AppState) -> Router {
    // 公开路由
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/login", post(auth::login))
        .route("/auth/google", post(auth::google_login))
        .route("/products", get(product::list_products))
        .route("/products/{id}", get(product::get_product))
        .route("/cart", get(cart::get_cart).post(cart::add_to_cart))
        .route(
            "/cart/{item_id}",
            put(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        .route("/discount/validate", post(discount::validate_discount))
        .route("/checkout", post(checkout::checkout));

    // 需要认证的路由
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // 管理员路由
    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}", get(admin::get_order))
        .route("/orders/{id}/status", patch(admin::update_order_status))
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route(
            "/discounts",
            get(admin::list_discounts).post(admin::create_discount),
        )
        .route(
            "/discounts/{id}",
            put(admin::update_discount).delete(admin::delete_discount),
        )
        .route(
            "/settings/telegram",
            get(admin::get_telegram).post(admin::set_telegram),
        )
        .layer(from_fn(admin_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/admin", admin_routes);

    let base = state.config.api_base_uri.trim_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{}", base), api)
    };

    router.with_state(state)
}
