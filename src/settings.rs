use sqlx::PgExecutor;

pub const TELEGRAM_CHAT_ID: &str = "telegram_chat_id";

/// Key/value rows of `admin_settings`.
pub struct AdminSetting;

impl AdminSetting {
    pub async fn get<'e, E: PgExecutor<'e>>(
        executor: E,
        key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM admin_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(executor)
                .await?;

        Ok(value.flatten())
    }

    /// Inserts or replaces a setting. `None` clears the stored value.
    pub async fn set<'e, E: PgExecutor<'e>>(
        executor: E,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO admin_settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(executor)
        .await?;

        Ok(())
    }
}
