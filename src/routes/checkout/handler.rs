use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    AppState,
    error::AppResult,
    middleware::CartIdentity,
    notify,
    routes::{cart::CartItem, discount::Discount},
    utils::{ApiResponse, JsonBody, success_to_api_response},
};

use super::model::{
    CheckoutLine, CheckoutRequest, CheckoutResponse, Order, OrderDraft, order_number,
};

/// 下单：Baridi Mob 付款凭证 + 购物车快照
#[axum::debug_handler]
pub async fn checkout(
    State(state): State<AppState>,
    identity: CartIdentity,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let owner = identity.require("Panier requis")?;
    let form = req.validate()?;

    // 事务内完成订单写入、库存扣减、优惠码计数与清空购物车
    let mut tx = state.pool.begin().await?;

    let lines = CheckoutLine::for_owner(&mut *tx, &owner).await?;
    let draft = OrderDraft::new(lines)?;

    let mut discount_amount = Decimal::ZERO;
    let mut applied_code = None;
    if let Some(code) = form.discount_code.as_deref() {
        let discount = Discount::find_by_code(&mut *tx, code).await?;
        discount_amount = Discount::evaluate_code(discount.as_ref(), draft.subtotal, Utc::now())?;
        if let Some(discount) = discount.filter(|_| discount_amount > Decimal::ZERO) {
            Discount::redeem(&mut *tx, discount.id).await?;
            applied_code = Some(discount.code);
        }
    }

    let number = order_number();
    let total = draft.total(discount_amount);
    let order_id = Order::place(
        &mut *tx,
        &owner,
        &number,
        &form,
        &draft,
        discount_amount,
        applied_code.as_deref(),
    )
    .await?;
    CartItem::clear(&mut *tx, &owner).await?;

    tx.commit().await?;
    tracing::info!("Order {} ({}) placed, total {} DA", number, order_id, total);

    // 通知失败只记录日志，不影响订单
    let summary = draft.items_summary();
    if notify::notify_new_order(&state, &number, total, &form.email, &summary).await {
        if let Err(e) = Order::mark_notified(&state.pool, order_id).await {
            tracing::warn!("Failed to flag order {} as notified: {}", number, e);
        }
    }
    if !notify::send_order_confirmation(&state, &form.email, &number, total, &summary, form.lang)
        .await
    {
        tracing::warn!("Confirmation email for order {} was not delivered", number);
    }

    Ok(success_to_api_response(CheckoutResponse {
        order_number: number,
        total,
        discount_amount,
        message: "Commande enregistrée".into(),
    }))
}
