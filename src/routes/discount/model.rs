use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use thiserror::Error;

use crate::{
    error::{AppError, AppResult},
    utils::{is_unique_violation, non_blank},
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Discount {
    pub id: i32,
    pub code: String,
    pub percent_off: Decimal,
    pub amount_off: Decimal,
    pub min_purchase: Decimal,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Why a code cannot be applied, in the order the checks run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountRejection {
    #[error("Code invalide")]
    Invalid,
    #[error("Code pas encore valide")]
    NotYetValid,
    #[error("Code expiré")]
    Expired,
    #[error("Code épuisé")]
    Exhausted,
    #[error("Minimum d'achat: {0} DA")]
    BelowMinimum(Decimal),
}

impl From<DiscountRejection> for AppError {
    fn from(rejection: DiscountRejection) -> Self {
        AppError::Validation(rejection.to_string())
    }
}

/// Admin create/update body. On update, missing amounts and flags keep the stored value
/// while the usage cap and validity window are replaced as given.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiscountPayload {
    pub code: Option<String>,
    pub percent_off: Option<Decimal>,
    pub amount_off: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    pub max_uses: Option<i32>,
    #[serde(deserialize_with = "timestamp")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp")]
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Amount taken off `subtotal`: the larger of the percentage and the fixed amount,
/// never more than the subtotal, rounded to cents.
pub fn compute_discount(percent_off: Decimal, amount_off: Decimal, subtotal: Decimal) -> Decimal {
    if subtotal <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let by_percent = subtotal * percent_off / Decimal::ONE_HUNDRED;
    by_percent
        .max(amount_off)
        .max(Decimal::ZERO)
        .min(subtotal)
        .round_dp(2)
}

// Accepts RFC 3339 as well as the naive forms sent by HTML date inputs, read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_timestamp(raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

impl DiscountPayload {
    /// Normalized code: trimmed and uppercased, `None` when blank.
    pub fn code(&self) -> Option<String> {
        non_blank(self.code.as_deref()).map(|code| code.to_uppercase())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self
            .percent_off
            .is_some_and(|p| p.is_sign_negative() || p > Decimal::ONE_HUNDRED)
        {
            return Err(AppError::Validation("percent_off invalide".into()));
        }
        let negative = [self.amount_off, self.min_purchase]
            .into_iter()
            .flatten()
            .any(|v| v.is_sign_negative() && !v.is_zero());
        if negative || self.max_uses.is_some_and(|m| m < 0) {
            return Err(AppError::Validation("Valeur invalide".into()));
        }
        Ok(())
    }
}

const DISCOUNT_COLUMNS: &str = "id, code, percent_off, amount_off, min_purchase, max_uses, used_count, valid_from, valid_until, is_active, created_at";

impl Discount {
    /// Applies the rejection rules in order, then computes the amount.
    pub fn evaluate(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<Decimal, DiscountRejection> {
        if !self.is_active {
            return Err(DiscountRejection::Invalid);
        }
        if self.valid_from.is_some_and(|from| from > now) {
            return Err(DiscountRejection::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| until < now) {
            return Err(DiscountRejection::Expired);
        }
        if self.max_uses.is_some_and(|max| self.used_count >= max) {
            return Err(DiscountRejection::Exhausted);
        }
        if self.min_purchase > Decimal::ZERO && subtotal < self.min_purchase {
            return Err(DiscountRejection::BelowMinimum(self.min_purchase));
        }

        Ok(compute_discount(self.percent_off, self.amount_off, subtotal))
    }

    /// Same as [`Discount::evaluate`], treating an unknown code as invalid.
    pub fn evaluate_code(
        discount: Option<&Discount>,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, DiscountRejection> {
        discount
            .ok_or(DiscountRejection::Invalid)?
            .evaluate(subtotal, now)
    }

    pub async fn find_by_code<'e, E: PgExecutor<'e>>(
        executor: E,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Discount>(&format!(
            "SELECT {} FROM discounts WHERE UPPER(code) = UPPER($1)",
            DISCOUNT_COLUMNS
        ))
        .bind(code.trim())
        .fetch_optional(executor)
        .await
    }

    pub async fn redeem<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE discounts SET used_count = used_count + 1 WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Discount>(&format!(
            "SELECT {} FROM discounts ORDER BY created_at DESC, id DESC",
            DISCOUNT_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &PgPool, code: &str, req: &DiscountPayload) -> AppResult<i32> {
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO discounts (code, percent_off, amount_off, min_purchase, max_uses, valid_from, valid_until, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(code)
        .bind(req.percent_off.unwrap_or_default())
        .bind(req.amount_off.unwrap_or_default())
        .bind(req.min_purchase.unwrap_or_default())
        .bind(req.max_uses)
        .bind(req.valid_from)
        .bind(req.valid_until)
        .bind(req.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(AppError::Validation("Code déjà existant".into())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(pool: &PgPool, id: i32, req: &DiscountPayload) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE discounts
            SET code = COALESCE($1, code),
                percent_off = COALESCE($2, percent_off),
                amount_off = COALESCE($3, amount_off),
                min_purchase = COALESCE($4, min_purchase),
                max_uses = $5,
                valid_from = $6,
                valid_until = $7,
                is_active = COALESCE($8, is_active)
            WHERE id = $9
            "#,
        )
        .bind(req.code())
        .bind(req.percent_off)
        .bind(req.amount_off)
        .bind(req.min_purchase)
        .bind(req.max_uses)
        .bind(req.valid_from)
        .bind(req.valid_until)
        .bind(req.is_active)
        .bind(id)
        .execute(pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if is_unique_violation(&e) => Err(AppError::Validation("Code déjà existant".into())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM discounts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn discount() -> Discount {
        Discount {
            id: 1,
            code: "BIENVENUE".into(),
            percent_off: dec(10),
            amount_off: Decimal::ZERO,
            min_purchase: Decimal::ZERO,
            max_uses: None,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percent_and_fixed_take_the_larger() {
        assert_eq!(compute_discount(dec(10), Decimal::ZERO, dec(5000)), dec(500));
        assert_eq!(compute_discount(dec(10), dec(1000), dec(5000)), dec(1000));
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let subtotals = [dec(0), dec(1), Decimal::new(1999, 2), dec(800), dec(5000)];
        let rules = [
            (dec(0), dec(0)),
            (dec(100), dec(0)),
            (dec(50), dec(10_000)),
            (dec(0), dec(999_999)),
            (Decimal::new(125, 1), dec(3)),
        ];
        for subtotal in subtotals {
            for (percent, amount) in rules {
                let off = compute_discount(percent, amount, subtotal);
                assert!(off <= subtotal, "{} off {}", off, subtotal);
                assert!(off >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn discount_is_rounded_to_cents() {
        let off = compute_discount(Decimal::new(333, 1), Decimal::ZERO, dec(100));
        assert_eq!(off, Decimal::new(3330, 2));
        let off = compute_discount(dec(15), Decimal::ZERO, Decimal::new(1999, 2));
        assert_eq!(off.scale(), 2);
        assert_eq!(off, Decimal::new(300, 2));
    }

    #[test]
    fn unknown_or_inactive_code_is_invalid() {
        let now = Utc::now();
        assert_eq!(
            Discount::evaluate_code(None, dec(100), now),
            Err(DiscountRejection::Invalid)
        );
        let inactive = Discount {
            is_active: false,
            ..discount()
        };
        assert_eq!(
            inactive.evaluate(dec(100), now),
            Err(DiscountRejection::Invalid)
        );
    }

    #[test]
    fn validity_window_is_enforced() {
        let now = Utc::now();
        let future = Discount {
            valid_from: Some(now + Duration::days(1)),
            ..discount()
        };
        assert_eq!(future.evaluate(dec(100), now), Err(DiscountRejection::NotYetValid));

        let past = Discount {
            valid_until: Some(now - Duration::days(1)),
            ..discount()
        };
        assert_eq!(past.evaluate(dec(100), now), Err(DiscountRejection::Expired));

        let open = Discount {
            valid_from: Some(now - Duration::days(1)),
            valid_until: Some(now + Duration::days(1)),
            ..discount()
        };
        assert_eq!(open.evaluate(dec(100), now), Ok(dec(10)));
    }

    #[test]
    fn usage_cap_rejects_next_use() {
        let now = Utc::now();
        let capped = Discount {
            max_uses: Some(3),
            used_count: 2,
            ..discount()
        };
        assert!(capped.evaluate(dec(100), now).is_ok());

        let exhausted = Discount {
            used_count: 3,
            ..capped
        };
        assert_eq!(exhausted.evaluate(dec(100), now), Err(DiscountRejection::Exhausted));
    }

    #[test]
    fn minimum_purchase_is_reported() {
        let now = Utc::now();
        let min = Discount {
            min_purchase: Decimal::new(300000, 2),
            ..discount()
        };
        let rejection = min.evaluate(dec(2999), now).unwrap_err();
        assert_eq!(rejection.to_string(), "Minimum d'achat: 3000.00 DA");
        assert_eq!(min.evaluate(dec(3000), now), Ok(dec(300)));
    }

    #[test]
    fn rejections_are_checked_in_order() {
        let now = Utc::now();
        let everything_wrong = Discount {
            valid_from: Some(now + Duration::days(1)),
            valid_until: Some(now - Duration::days(1)),
            max_uses: Some(0),
            min_purchase: dec(1000),
            ..discount()
        };
        assert_eq!(
            everything_wrong.evaluate(dec(1), now),
            Err(DiscountRejection::NotYetValid)
        );
    }

    #[test]
    fn payload_code_is_uppercased() {
        let payload = DiscountPayload {
            code: Some("  ete2024 ".into()),
            ..Default::default()
        };
        assert_eq!(payload.code().as_deref(), Some("ETE2024"));
        assert_eq!(DiscountPayload::default().code(), None);
    }

    #[test]
    fn payload_accepts_date_input_formats() {
        let payload: DiscountPayload = serde_json::from_str(
            r#"{"code":"X","valid_from":"2024-06-01T10:30","valid_until":"2024-07-01"}"#,
        )
        .unwrap();
        assert_eq!(
            payload.valid_from.unwrap().to_rfc3339(),
            "2024-06-01T10:30:00+00:00"
        );
        assert_eq!(
            payload.valid_until.unwrap().to_rfc3339(),
            "2024-07-01T00:00:00+00:00"
        );

        let cleared: DiscountPayload =
            serde_json::from_str(r#"{"valid_from":null,"valid_until":""}"#).unwrap();
        assert!(cleared.valid_from.is_none());
        assert!(cleared.valid_until.is_none());
    }

    #[test]
    fn payload_rejects_out_of_range_values() {
        let too_much = DiscountPayload {
            percent_off: Some(dec(150)),
            ..Default::default()
        };
        assert!(too_much.validate().is_err());

        let negative = DiscountPayload {
            amount_off: Some(dec(-5)),
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let fine = DiscountPayload {
            percent_off: Some(dec(20)),
            max_uses: Some(10),
            ..Default::default()
        };
        assert!(fine.validate().is_ok());
    }
}
