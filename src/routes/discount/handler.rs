use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::{AppError, AppResult},
    utils::{ApiResponse, JsonBody, non_blank, success_to_api_response},
};

use super::model::Discount;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidateDiscountRequest {
    pub code: Option<String>,
    pub subtotal: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ValidateDiscountResponse {
    pub valid: bool,
    pub discount_amount: Decimal,
    pub code: String,
}

/// 校验优惠码
#[axum::debug_handler]
pub async fn validate_discount(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ValidateDiscountRequest>,
) -> AppResult<Json<ApiResponse<ValidateDiscountResponse>>> {
    let code = non_blank(req.code.as_deref())
        .map(|code| code.to_uppercase())
        .ok_or_else(|| AppError::Validation("Code requis".into()))?;
    let subtotal = req.subtotal.unwrap_or_default().max(Decimal::ZERO);

    let discount = Discount::find_by_code(&state.pool, &code).await?;
    let discount_amount = Discount::evaluate_code(discount.as_ref(), subtotal, Utc::now())?;

    Ok(success_to_api_response(ValidateDiscountResponse {
        valid: true,
        discount_amount,
        code,
    }))
}
