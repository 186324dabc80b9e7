use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use crate::routes::product::Product;

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_orders: i64,
    pub total_sales: Decimal,
    pub total_products: i64,
    pub sales_by_day: Vec<DailySales>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DailySales {
    pub date: NaiveDate,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i32,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TelegramSettings {
    pub telegram_chat_id: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TelegramSettingsRequest {
    pub telegram_chat_id: Option<Value>,
}

impl TelegramSettingsRequest {
    /// Chat ids arrive as strings or bare numbers; blanks clear the setting.
    pub fn chat_id(&self) -> Option<String> {
        match self.telegram_chat_id.as_ref()? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl AdminStats {
    pub async fn collect(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let (total_orders, total_sales): (i64, Decimal) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(total), 0) FROM orders")
                .fetch_one(pool)
                .await?;

        let total_products = Product::count_active(pool).await?;

        // 最近 30 个有订单的日期
        let sales_by_day = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT DATE(created_at) AS date, COUNT(*) AS count, COALESCE(SUM(total), 0) AS total
            FROM orders
            GROUP BY DATE(created_at)
            ORDER BY date DESC
            LIMIT 30
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(Self {
            total_orders,
            total_sales,
            total_products,
            sales_by_day,
        })
    }
}
