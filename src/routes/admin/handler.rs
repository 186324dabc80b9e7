use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    notify,
    routes::{
        checkout::{Order, OrderDetail, OrderStatus},
        discount::{Discount, DiscountPayload},
        product::{NewProduct, Product, ProductUpdate},
    },
    settings::{AdminSetting, TELEGRAM_CHAT_ID},
    utils::{ApiResponse, JsonBody, MessageResponse, non_blank, success_to_api_response},
};

use super::model::{
    AdminStats, CreatedResponse, TelegramSettings, TelegramSettingsRequest, UpdateStatusRequest,
};

const TELEGRAM_TEST_MESSAGE: &str =
    "✅ Notifications DZ Clothes activées. Vous recevrez les nouvelles commandes ici.";

type Created = (StatusCode, Json<ApiResponse<CreatedResponse>>);

fn created(id: i32, message: &str) -> Created {
    (
        StatusCode::CREATED,
        success_to_api_response(CreatedResponse {
            id,
            message: message.into(),
        }),
    )
}

#[axum::debug_handler]
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<ApiResponse<AdminStats>>> {
    Ok(success_to_api_response(AdminStats::collect(&state.pool).await?))
}

// ---- 订单 ----

#[axum::debug_handler]
pub async fn list_orders(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    Ok(success_to_api_response(Order::list(&state.pool).await?))
}

#[axum::debug_handler]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = Order::find(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Commande introuvable".into()))?;
    let items = Order::items(&state.pool, id).await?;

    Ok(success_to_api_response(OrderDetail { order, items }))
}

#[axum::debug_handler]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    let status: OrderStatus = non_blank(req.status.as_deref())
        .ok_or_else(|| AppError::Validation("status requis".into()))?
        .parse()?;

    if !Order::update_status(&state.pool, id, status).await? {
        return Err(AppError::NotFound("Commande introuvable".into()));
    }

    tracing::info!("Order {} moved to {}", id, status);
    Ok(success_to_api_response(MessageResponse::new("Statut mis à jour")))
}

// ---- 商品 ----

#[axum::debug_handler]
pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    Ok(success_to_api_response(Product::list_all(&state.pool).await?))
}

#[axum::debug_handler]
pub async fn create_product(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NewProduct>,
) -> AppResult<Created> {
    let name_fr = req.validate()?;
    let id = Product::create(&state.pool, &name_fr, &req).await?;

    tracing::info!("Product {} created", id);
    Ok(created(id, "Produit créé"))
}

#[axum::debug_handler]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(req): JsonBody<ProductUpdate>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    req.validate()?;
    if !Product::update(&state.pool, id, &req).await? {
        return Err(AppError::NotFound("Produit introuvable".into()));
    }
    Ok(success_to_api_response(MessageResponse::new("Produit mis à jour")))
}

#[axum::debug_handler]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    if !Product::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Produit introuvable".into()));
    }
    Ok(success_to_api_response(MessageResponse::new("Produit supprimé")))
}

// ---- 优惠码 ----

#[axum::debug_handler]
pub async fn list_discounts(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Discount>>>> {
    Ok(success_to_api_response(Discount::list(&state.pool).await?))
}

#[axum::debug_handler]
pub async fn create_discount(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DiscountPayload>,
) -> AppResult<Created> {
    let code = req
        .code()
        .ok_or_else(|| AppError::Validation("code requis".into()))?;
    req.validate()?;

    let id = Discount::create(&state.pool, &code, &req).await?;
    tracing::info!("Discount {} created as {}", code, id);
    Ok(created(id, "Réduction créée"))
}

#[axum::debug_handler]
pub async fn update_discount(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(req): JsonBody<DiscountPayload>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    req.validate()?;
    if !Discount::update(&state.pool, id, &req).await? {
        return Err(AppError::NotFound("Réduction introuvable".into()));
    }
    Ok(success_to_api_response(MessageResponse::new("Réduction mise à jour")))
}

#[axum::debug_handler]
pub async fn delete_discount(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    if !Discount::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Réduction introuvable".into()));
    }
    Ok(success_to_api_response(MessageResponse::new("Réduction supprimée")))
}

// ---- Telegram ----

#[axum::debug_handler]
pub async fn get_telegram(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<TelegramSettings>>> {
    let chat_id = notify::admin_chat_id(&state).await;
    Ok(success_to_api_response(TelegramSettings {
        enabled: chat_id.is_some(),
        telegram_chat_id: chat_id,
    }))
}

#[axum::debug_handler]
pub async fn set_telegram(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TelegramSettingsRequest>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    let chat_id = req.chat_id();
    AdminSetting::set(&state.pool, TELEGRAM_CHAT_ID, chat_id.as_deref()).await?;

    if !notify::send_telegram_notification(&state, TELEGRAM_TEST_MESSAGE).await {
        tracing::warn!("Telegram test message was not delivered");
    }
    Ok(success_to_api_response(MessageResponse::new("Telegram configuré")))
}
