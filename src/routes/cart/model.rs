use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::{
    middleware::CartOwner,
    utils::{Lang, non_blank},
};

/// Cart line joined with its product.
#[derive(Debug, Clone, FromRow)]
pub struct CartRow {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub option_size: Option<String>,
    pub option_color: Option<String>,
    pub name_fr: String,
    pub name_ar: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub stock: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLine {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub option_size: Option<String>,
    pub option_color: Option<String>,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub stock: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddToCartRequest {
    pub product_id: Option<i32>,
    pub quantity: Option<i32>,
    pub option_size: Option<String>,
    pub option_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateCartItemRequest {
    pub quantity: Option<i32>,
}

/// Size and color chosen for a line. Blank values are stored as `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOptions {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl LineOptions {
    pub fn new(size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            size: non_blank(size),
            color: non_blank(color),
        }
    }

    pub fn matches(&self, size: Option<&str>, color: Option<&str>) -> bool {
        *self == Self::new(size, color)
    }
}

/// Existing line of the same owner and product, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct LineKey {
    pub id: i32,
    pub option_size: Option<String>,
    pub option_color: Option<String>,
}

/// Line an addition merges into: same owner and product are assumed, options must match.
pub fn find_mergeable(existing: &[LineKey], options: &LineOptions) -> Option<i32> {
    existing
        .iter()
        .find(|line| options.matches(line.option_size.as_deref(), line.option_color.as_deref()))
        .map(|line| line.id)
}

impl CartRow {
    pub fn localize(self, lang: Lang) -> CartLine {
        CartLine {
            name: lang.pick(&self.name_fr, self.name_ar.as_deref()).to_string(),
            id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            option_size: self.option_size,
            option_color: self.option_color,
            price: self.price,
            image_url: self.image_url,
            stock: self.stock,
        }
    }
}

// Owner filter shared by every cart query: user lines have no session and
// session lines have no user, so both binds are compared.
const OWNER_FILTER: &str =
    "c.user_id IS NOT DISTINCT FROM $1 AND c.session_id IS NOT DISTINCT FROM $2";

pub struct CartItem;

impl CartItem {
    /// Lines of active products in the owner's cart.
    pub async fn lines(pool: &PgPool, owner: &CartOwner) -> Result<Vec<CartRow>, sqlx::Error> {
        sqlx::query_as::<_, CartRow>(&format!(
            r#"
            SELECT c.id, c.product_id, c.quantity, c.option_size, c.option_color,
                   p.name_fr, p.name_ar, p.price, p.image_url, p.stock
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE {} AND p.is_active = TRUE
            ORDER BY c.created_at, c.id
            "#,
            OWNER_FILTER
        ))
        .bind(owner.user_id())
        .bind(owner.session_id())
        .fetch_all(pool)
        .await
    }

    /// Adds `quantity` of a product, merging into the line with identical options.
    /// Returns the id of the line that was created or incremented.
    pub async fn add(
        pool: &PgPool,
        owner: &CartOwner,
        product_id: i32,
        quantity: i32,
        options: &LineOptions,
    ) -> Result<i32, sqlx::Error> {
        let existing = sqlx::query_as::<_, LineKey>(&format!(
            r#"
            SELECT c.id, c.option_size, c.option_color
            FROM cart_items c
            WHERE {} AND c.product_id = $3
            ORDER BY c.id
            "#,
            OWNER_FILTER
        ))
        .bind(owner.user_id())
        .bind(owner.session_id())
        .bind(product_id)
        .fetch_all(pool)
        .await?;

        if let Some(line_id) = find_mergeable(&existing, options) {
            sqlx::query("UPDATE cart_items SET quantity = quantity + $1 WHERE id = $2")
                .bind(quantity)
                .bind(line_id)
                .execute(pool)
                .await?;
            return Ok(line_id);
        }

        sqlx::query_scalar(
            r#"
            INSERT INTO cart_items (user_id, session_id, product_id, quantity, option_size, option_color)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(owner.user_id())
        .bind(owner.session_id())
        .bind(product_id)
        .bind(quantity)
        .bind(options.size.as_deref())
        .bind(options.color.as_deref())
        .fetch_one(pool)
        .await
    }

    /// Sets a line's quantity; zero removes it. Returns `false` when the line is not the owner's.
    pub async fn set_quantity(
        pool: &PgPool,
        owner: &CartOwner,
        item_id: i32,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        if quantity <= 0 {
            return Self::remove(pool, owner, item_id).await;
        }

        let result = sqlx::query(&format!(
            "UPDATE cart_items c SET quantity = $3 WHERE {} AND c.id = $4",
            OWNER_FILTER
        ))
        .bind(owner.user_id())
        .bind(owner.session_id())
        .bind(quantity)
        .bind(item_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(pool: &PgPool, owner: &CartOwner, item_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            "DELETE FROM cart_items c WHERE {} AND c.id = $3",
            OWNER_FILTER
        ))
        .bind(owner.user_id())
        .bind(owner.session_id())
        .bind(item_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear<'e, E: PgExecutor<'e>>(
        executor: E,
        owner: &CartOwner,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(&format!("DELETE FROM cart_items c WHERE {}", OWNER_FILTER))
            .bind(owner.user_id())
            .bind(owner.session_id())
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: i32, size: Option<&str>, color: Option<&str>) -> LineKey {
        LineKey {
            id,
            option_size: size.map(String::from),
            option_color: color.map(String::from),
        }
    }

    #[test]
    fn same_options_merge() {
        let existing = vec![key(1, Some("M"), Some("Noir"))];
        let options = LineOptions::new(Some("M"), Some("Noir"));
        assert_eq!(find_mergeable(&existing, &options), Some(1));
    }

    #[test]
    fn different_options_are_separate_lines() {
        let existing = vec![key(1, Some("M"), Some("Noir"))];
        assert_eq!(
            find_mergeable(&existing, &LineOptions::new(Some("L"), Some("Noir"))),
            None
        );
        assert_eq!(
            find_mergeable(&existing, &LineOptions::new(Some("M"), None)),
            None
        );
    }

    #[test]
    fn null_and_blank_options_are_equal() {
        let existing = vec![key(4, None, Some("")), key(5, Some("S"), None)];
        assert_eq!(
            find_mergeable(&existing, &LineOptions::new(Some("  "), None)),
            Some(4)
        );
        assert_eq!(
            find_mergeable(&existing, &LineOptions::new(Some(" S "), Some(""))),
            Some(5)
        );
    }

    #[test]
    fn empty_cart_never_merges() {
        assert_eq!(find_mergeable(&[], &LineOptions::default()), None);
    }

    #[test]
    fn localizes_line_name() {
        let row = CartRow {
            id: 1,
            product_id: 2,
            quantity: 3,
            option_size: Some("M".into()),
            option_color: None,
            name_fr: "Polo Bleu Marine".into(),
            name_ar: Some("بولو أزرق داكن".into()),
            price: Decimal::new(2800, 0),
            image_url: None,
            stock: 45,
        };
        assert_eq!(row.clone().localize(Lang::Fr).name, "Polo Bleu Marine");
        let line = row.localize(Lang::Ar);
        assert_eq!(line.name, "بولو أزرق داكن");
        assert_eq!(line.quantity, 3);
    }
}
