use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::CartOwner,
    utils::{Lang, non_blank},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub shipping_address: Option<String>,
    pub baridi_phone: Option<String>,
    pub baridi_reference: Option<String>,
    pub discount_code: Option<String>,
    pub lang: Option<String>,
}

/// Checkout fields once trimmed and checked.
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    pub email: String,
    pub full_name: String,
    pub shipping_address: String,
    pub baridi_phone: String,
    pub baridi_reference: String,
    pub discount_code: Option<String>,
    pub lang: Lang,
}

impl CheckoutRequest {
    pub fn validate(self) -> Result<CheckoutForm, AppError> {
        let (Some(email), Some(full_name), Some(shipping_address)) = (
            non_blank(self.email.as_deref()),
            non_blank(self.full_name.as_deref()),
            non_blank(self.shipping_address.as_deref()),
        ) else {
            return Err(AppError::Validation("Email, nom et adresse requis".into()));
        };

        let (Some(baridi_phone), Some(baridi_reference)) = (
            non_blank(self.baridi_phone.as_deref()),
            non_blank(self.baridi_reference.as_deref()),
        ) else {
            return Err(AppError::Validation(
                "Numéro Baridi Mob et référence requis".into(),
            ));
        };

        Ok(CheckoutForm {
            email,
            full_name,
            shipping_address,
            baridi_phone,
            baridi_reference,
            discount_code: non_blank(self.discount_code.as_deref()).map(|c| c.to_uppercase()),
            lang: Lang::from_param(self.lang.as_deref()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_number: String,
    pub total: Decimal,
    pub discount_amount: Decimal,
    pub message: String,
}

/// Cart line priced with the product's live price and stock.
#[derive(Debug, Clone, FromRow)]
pub struct CheckoutLine {
    pub product_id: i32,
    pub quantity: i32,
    pub option_size: Option<String>,
    pub option_color: Option<String>,
    pub name_fr: String,
    pub name_ar: Option<String>,
    pub price: Decimal,
    pub stock: i32,
}

impl CheckoutLine {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub async fn for_owner<'e, E: PgExecutor<'e>>(
        executor: E,
        owner: &CartOwner,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CheckoutLine>(
            r#"
            SELECT c.product_id, c.quantity, c.option_size, c.option_color,
                   p.name_fr, p.name_ar, p.price, p.stock
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id IS NOT DISTINCT FROM $1
              AND c.session_id IS NOT DISTINCT FROM $2
              AND p.is_active = TRUE
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(owner.user_id())
        .bind(owner.session_id())
        .fetch_all(executor)
        .await
    }
}

/// Priced cart, ready to become an order.
#[derive(Debug)]
pub struct OrderDraft {
    pub lines: Vec<CheckoutLine>,
    pub subtotal: Decimal,
}

impl OrderDraft {
    pub fn new(lines: Vec<CheckoutLine>) -> Result<Self, AppError> {
        if lines.is_empty() {
            return Err(AppError::Validation("Panier vide".into()));
        }
        // lines of one product with different options share its stock
        let mut requested: HashMap<i32, i32> = HashMap::new();
        for line in &lines {
            *requested.entry(line.product_id).or_default() += line.quantity;
        }
        if let Some(short) = lines.iter().find(|line| {
            requested
                .get(&line.product_id)
                .is_some_and(|&quantity| quantity > line.stock)
        }) {
            return Err(AppError::Validation(format!(
                "Stock insuffisant: {}",
                short.name_fr
            )));
        }

        let subtotal = lines.iter().map(CheckoutLine::line_total).sum::<Decimal>();
        Ok(Self { lines, subtotal })
    }

    pub fn total(&self, discount_amount: Decimal) -> Decimal {
        (self.subtotal - discount_amount)
            .max(Decimal::ZERO)
            .round_dp(2)
    }

    /// One `- name xqty = amount DA` row per line, for notifications.
    pub fn items_summary(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                format!(
                    "- {} x{} = {:.2} DA",
                    line.name_fr,
                    line.quantity,
                    line.line_total()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `DZ-` followed by eight uppercase hex digits.
pub fn order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("DZ-{}", hex[..8].to_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::Validation(format!("Statut invalide: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: i32,
    pub user_id: Option<i32>,
    pub order_number: String,
    pub status: String,
    pub total: Decimal,
    pub discount_amount: Decimal,
    pub discount_code: Option<String>,
    pub baridi_phone: Option<String>,
    pub baridi_reference: Option<String>,
    pub shipping_address: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub telegram_notified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: i32,
    pub product_id: Option<i32>,
    pub product_name_fr: Option<String>,
    pub product_name_ar: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub option_size: Option<String>,
    pub option_color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

const ORDER_COLUMNS: &str = "id, user_id, order_number, status, total, discount_amount, discount_code, baridi_phone, baridi_reference, shipping_address, email, full_name, telegram_notified, created_at";

impl Order {
    /// Writes a pending order, its lines and the stock decrements on one connection.
    pub async fn place(
        conn: &mut PgConnection,
        owner: &CartOwner,
        number: &str,
        form: &CheckoutForm,
        draft: &OrderDraft,
        discount_amount: Decimal,
        discount_code: Option<&str>,
    ) -> Result<i32, sqlx::Error> {
        let order_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, order_number, status, total, discount_amount, discount_code,
                                baridi_phone, baridi_reference, shipping_address, email, full_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(owner.user_id())
        .bind(number)
        .bind(OrderStatus::Pending.as_str())
        .bind(draft.total(discount_amount))
        .bind(discount_amount)
        .bind(discount_code)
        .bind(&form.baridi_phone)
        .bind(&form.baridi_reference)
        .bind(&form.shipping_address)
        .bind(&form.email)
        .bind(&form.full_name)
        .fetch_one(&mut *conn)
        .await?;

        for line in &draft.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name_fr, product_name_ar,
                                         price, quantity, option_size, option_color)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.name_fr)
            .bind(line.name_ar.as_deref())
            .bind(line.price)
            .bind(line.quantity)
            .bind(line.option_size.as_deref())
            .bind(line.option_color.as_deref())
            .execute(&mut *conn)
            .await?;

            sqlx::query("UPDATE products SET stock = GREATEST(stock - $1, 0) WHERE id = $2")
                .bind(line.quantity)
                .bind(line.product_id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(order_id)
    }

    pub async fn mark_notified(pool: &PgPool, id: i32) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE orders SET telegram_notified = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC, id DESC",
            ORDER_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn items(pool: &PgPool, order_id: i32) -> Result<Vec<OrderItem>, sqlx::Error> {
        sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, product_id, product_name_fr, product_name_ar, price, quantity, option_size, option_color
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: i32,
        status: OrderStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i32, name: &str, price: i64, quantity: i32, stock: i32) -> CheckoutLine {
        CheckoutLine {
            product_id,
            quantity,
            option_size: None,
            option_color: None,
            name_fr: name.into(),
            name_ar: None,
            price: Decimal::new(price, 0),
            stock,
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            email: Some("client@exemple.dz".into()),
            full_name: Some("Amine B.".into()),
            shipping_address: Some("12 rue Didouche, Alger".into()),
            baridi_phone: Some("0550123456".into()),
            baridi_reference: Some("REF-778".into()),
            discount_code: Some(" bienvenue ".into()),
            lang: Some("ar".into()),
        }
    }

    #[test]
    fn complete_form_is_normalized() {
        let form = request().validate().unwrap();
        assert_eq!(form.discount_code.as_deref(), Some("BIENVENUE"));
        assert_eq!(form.lang, Lang::Ar);
        assert_eq!(form.baridi_reference, "REF-778");
    }

    #[test]
    fn missing_contact_fields_are_rejected_first() {
        let req = CheckoutRequest {
            shipping_address: Some("   ".into()),
            baridi_phone: None,
            ..request()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Email, nom et adresse requis");
    }

    #[test]
    fn missing_payment_fields_are_rejected() {
        let req = CheckoutRequest {
            baridi_reference: None,
            ..request()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Numéro Baridi Mob et référence requis");
    }

    #[test]
    fn blank_discount_code_is_ignored() {
        let req = CheckoutRequest {
            discount_code: Some("  ".into()),
            ..request()
        };
        assert!(req.validate().unwrap().discount_code.is_none());
    }

    #[test]
    fn empty_cart_cannot_be_ordered() {
        let err = OrderDraft::new(Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "Panier vide");
    }

    #[test]
    fn quantity_above_stock_is_rejected() {
        let err = OrderDraft::new(vec![
            line(1, "Jean Slim", 3500, 2, 5),
            line(2, "Polo", 2800, 4, 3),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "Stock insuffisant: Polo");
    }

    #[test]
    fn option_lines_of_one_product_share_its_stock() {
        let sized = |size: &str| CheckoutLine {
            option_size: Some(size.into()),
            ..line(8, "Chemise Lin", 3200, 3, 5)
        };
        let err = OrderDraft::new(vec![sized("M"), sized("L")]).unwrap_err();
        assert_eq!(err.to_string(), "Stock insuffisant: Chemise Lin");

        let fits = CheckoutLine {
            quantity: 2,
            ..sized("L")
        };
        let draft = OrderDraft::new(vec![sized("M"), fits]).unwrap();
        assert_eq!(draft.subtotal, Decimal::new(16000, 0));
    }

    #[test]
    fn subtotal_and_total() {
        let draft = OrderDraft::new(vec![
            line(1, "Jean Slim", 3500, 2, 5),
            line(2, "Polo", 2800, 1, 3),
        ])
        .unwrap();
        assert_eq!(draft.subtotal, Decimal::new(9800, 0));
        assert_eq!(draft.total(Decimal::new(980, 0)), Decimal::new(8820, 0));
        assert_eq!(draft.total(Decimal::new(20000, 0)), Decimal::ZERO);
    }

    #[test]
    fn summary_lists_every_line() {
        let draft = OrderDraft::new(vec![
            line(1, "Jean Slim", 3500, 2, 5),
            line(2, "Polo", 2800, 1, 3),
        ])
        .unwrap();
        assert_eq!(
            draft.items_summary(),
            "- Jean Slim x2 = 7000.00 DA\n- Polo x1 = 2800.00 DA"
        );
    }

    #[test]
    fn order_numbers_have_fixed_shape() {
        let number = order_number();
        assert_eq!(number.len(), 11);
        assert!(number.starts_with("DZ-"));
        assert!(
            number[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
        assert_ne!(order_number(), number);
    }

    #[test]
    fn status_parsing() {
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert_eq!(" Shipped ".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Delivered.to_string(), "delivered");
    }
}
