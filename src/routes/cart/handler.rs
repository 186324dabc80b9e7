use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::CartIdentity,
    routes::product::Product,
    utils::{ApiResponse, JsonBody, LangQuery, MessageResponse, success_to_api_response},
};

use super::model::{AddToCartRequest, CartItem, CartLine, LineOptions, UpdateCartItemRequest};

#[axum::debug_handler]
pub async fn get_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Query(query): Query<LangQuery>,
) -> AppResult<Json<ApiResponse<Vec<CartLine>>>> {
    let Some(owner) = identity.0 else {
        return Ok(success_to_api_response(Vec::new()));
    };

    let lang = query.lang();
    let lines = CartItem::lines(&state.pool, &owner).await?;

    Ok(success_to_api_response(
        lines.into_iter().map(|row| row.localize(lang)).collect(),
    ))
}

#[axum::debug_handler]
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    JsonBody(req): JsonBody<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    let owner = identity.require("Connexion ou session panier requise")?;
    let product_id = req
        .product_id
        .ok_or_else(|| AppError::Validation("product_id requis".into()))?;
    let quantity = req.quantity.unwrap_or(1).max(1);
    let options = LineOptions::new(req.option_size.as_deref(), req.option_color.as_deref());

    Product::find_active(&state.pool, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Produit introuvable".into()))?;

    let line_id = CartItem::add(&state.pool, &owner, product_id, quantity, &options).await?;
    tracing::debug!("Cart line {} now holds product {}", line_id, product_id);

    Ok(success_to_api_response(MessageResponse::new("Ajouté au panier")))
}

#[axum::debug_handler]
pub async fn update_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<i32>,
    JsonBody(req): JsonBody<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    let quantity = req
        .quantity
        .ok_or_else(|| AppError::Validation("quantity requis".into()))?
        .max(0);
    let owner = identity.require("Connexion ou session panier requise")?;

    if !CartItem::set_quantity(&state.pool, &owner, item_id, quantity).await? {
        return Err(AppError::NotFound("Article introuvable".into()));
    }

    Ok(success_to_api_response(MessageResponse::new("Panier mis à jour")))
}

#[axum::debug_handler]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<i32>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    let owner = identity.require("Connexion ou session panier requise")?;

    if !CartItem::remove(&state.pool, &owner, item_id).await? {
        return Err(AppError::NotFound("Article introuvable".into()));
    }

    Ok(success_to_api_response(MessageResponse::new("Supprimé")))
}
