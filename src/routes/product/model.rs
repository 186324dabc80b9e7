use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{
    error::AppError,
    utils::{Lang, non_blank, split_options},
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i32,
    pub name_fr: String,
    pub name_ar: Option<String>,
    pub description_fr: Option<String>,
    pub description_ar: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock: i32,
    pub options_sizes: Option<String>,
    pub options_colors: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Storefront view of a product in one language.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock: i32,
    pub options_sizes: Vec<String>,
    pub options_colors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewProduct {
    pub name_fr: Option<String>,
    pub name_ar: Option<String>,
    pub description_fr: Option<String>,
    pub description_ar: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub options_sizes: Option<String>,
    pub options_colors: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial update: blank text, a zero price and missing fields keep the stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub name_fr: Option<String>,
    pub name_ar: Option<String>,
    pub description_fr: Option<String>,
    pub description_ar: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub options_sizes: Option<String>,
    pub options_colors: Option<String>,
    pub is_active: Option<bool>,
}

const PRODUCT_COLUMNS: &str = "id, name_fr, name_ar, description_fr, description_ar, price, image_url, category, stock, options_sizes, options_colors, is_active, created_at";

impl NewProduct {
    pub fn validate(&self) -> Result<String, AppError> {
        let name_fr = non_blank(self.name_fr.as_deref())
            .ok_or_else(|| AppError::Validation("name_fr requis".into()))?;
        if self.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(AppError::Validation("Prix invalide".into()));
        }
        if self.stock.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("Stock invalide".into()));
        }
        Ok(name_fr)
    }
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(AppError::Validation("Prix invalide".into()));
        }
        if self.stock.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("Stock invalide".into()));
        }
        Ok(())
    }
}

impl Product {
    pub fn localize(&self, lang: Lang) -> ProductView {
        let description = lang.pick(
            self.description_fr.as_deref().unwrap_or_default(),
            self.description_ar.as_deref(),
        );

        ProductView {
            id: self.id,
            name: lang.pick(&self.name_fr, self.name_ar.as_deref()).to_string(),
            description: description.to_string(),
            price: self.price,
            image_url: self.image_url.clone(),
            category: self.category.clone(),
            stock: self.stock,
            options_sizes: split_options(self.options_sizes.as_deref()),
            options_colors: split_options(self.options_colors.as_deref()),
        }
    }

    /// Active products, newest first, optionally restricted to one category.
    pub async fn list_active(
        pool: &PgPool,
        category: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE is_active = TRUE AND ($1::TEXT IS NULL OR category = $1)
            ORDER BY created_at DESC, id DESC
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(category)
        .fetch_all(pool)
        .await
    }

    pub async fn find_active(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND is_active = TRUE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY created_at DESC, id DESC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = TRUE")
            .fetch_one(pool)
            .await
    }

    pub async fn create(pool: &PgPool, name_fr: &str, req: &NewProduct) -> Result<i32, sqlx::Error> {
        let text = |v: &Option<String>| non_blank(v.as_deref()).unwrap_or_default();

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                name_fr, name_ar, description_fr, description_ar, price, image_url,
                category, stock, options_sizes, options_colors, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(name_fr)
        .bind(text(&req.name_ar))
        .bind(text(&req.description_fr))
        .bind(text(&req.description_ar))
        .bind(req.price.unwrap_or_default())
        .bind(text(&req.image_url))
        .bind(text(&req.category))
        .bind(req.stock.unwrap_or(0))
        .bind(text(&req.options_sizes))
        .bind(text(&req.options_colors))
        .bind(req.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await?;

        tracing::info!("Created product {} ({})", id, name_fr);
        Ok(id)
    }

    /// Returns `false` when the product does not exist.
    pub async fn update(pool: &PgPool, id: i32, req: &ProductUpdate) -> Result<bool, sqlx::Error> {
        let text = |v: &Option<String>| non_blank(v.as_deref());

        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products SET
                name_fr = COALESCE($1, name_fr),
                name_ar = COALESCE($2, name_ar),
                description_fr = COALESCE($3, description_fr),
                description_ar = COALESCE($4, description_ar),
                price = COALESCE(NULLIF($5::NUMERIC, 0), price),
                image_url = COALESCE($6, image_url),
                category = COALESCE($7, category),
                stock = COALESCE($8, stock),
                options_sizes = COALESCE($9, options_sizes),
                options_colors = COALESCE($10, options_colors),
                is_active = COALESCE($11, is_active)
            WHERE id = $12
            RETURNING id
            "#,
        )
        .bind(text(&req.name_fr))
        .bind(text(&req.name_ar))
        .bind(text(&req.description_fr))
        .bind(text(&req.description_ar))
        .bind(req.price)
        .bind(text(&req.image_url))
        .bind(text(&req.category))
        .bind(req.stock)
        .bind(text(&req.options_sizes))
        .bind(text(&req.options_colors))
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(updated.is_some())
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
