use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    AppState,
    error::{AppError, AppResult},
    utils::{ApiResponse, Lang, LangQuery, non_blank, success_to_api_response},
};

use super::model::{Product, ProductView};

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub lang: Option<String>,
    pub category: Option<String>,
}

#[axum::debug_handler]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<ApiResponse<Vec<ProductView>>>> {
    let lang = Lang::from_param(query.lang.as_deref());
    let category = non_blank(query.category.as_deref());

    let products = Product::list_active(&state.pool, category.as_deref()).await?;

    Ok(success_to_api_response(
        products.iter().map(|p| p.localize(lang)).collect(),
    ))
}

#[axum::debug_handler]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<LangQuery>,
) -> AppResult<Json<ApiResponse<ProductView>>> {
    let product = Product::find_active(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Produit introuvable".into()))?;

    Ok(success_to_api_response(product.localize(query.lang())))
}
