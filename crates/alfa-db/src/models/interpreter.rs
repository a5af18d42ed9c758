//! Interpreter records, the local system of record for payees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use crate::error::StoreResult;

/// An interpreter in the payment system.
///
/// Alternate keys sourced from the CRM (`record_id`, `email`,
/// `employee_id`) are what the reconciliation engine matches on.
/// Rates are kept as decimal-bearing strings to preserve source
/// formatting and allow blank/unset.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interpreter {
    /// Local primary key.
    pub id: String,
    /// CRM record id (alternate key).
    pub record_id: Option<String>,
    /// Display name; defaults to "Unknown" when the CRM has none.
    pub contact_name: String,
    /// Last name.
    pub last_name: Option<String>,
    /// Email address (alternate key).
    pub email: Option<String>,
    /// Employee id (alternate key).
    pub employee_id: Option<String>,
    /// Cloudbreak portal id.
    pub cloudbreak_id: Option<String>,
    /// Languagelink portal id.
    pub languagelink_id: Option<String>,
    /// Propio portal id.
    pub propio_id: Option<String>,
    /// Spoken language(s).
    pub language: Option<String>,
    /// Country of residence.
    pub country: Option<String>,
    /// Payment frequency.
    pub payment_frequency: Option<String>,
    /// Service location (on-site / remote / ...).
    pub service_location: Option<String>,
    /// CRM onboarding status.
    pub onboarding_status: Option<String>,
    /// Per-minute rate, as the source formatted it.
    pub rate_per_minute: Option<String>,
    /// Per-hour rate, as the source formatted it.
    pub rate_per_hour: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Interpreter {
    /// Create an empty record with the given id and display name.
    #[must_use]
    pub fn new(id: String, contact_name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            record_id: None,
            contact_name,
            last_name: None,
            email: None,
            employee_id: None,
            cloudbreak_id: None,
            languagelink_id: None,
            propio_id: None,
            language: None,
            country: None,
            payment_frequency: None,
            service_location: None,
            onboarding_status: None,
            rate_per_minute: None,
            rate_per_hour: None,
            created_at: now,
            updated_at: now,
        }
    }
}

const INTERPRETER_COLUMNS: &str = "id, record_id, contact_name, last_name, email, employee_id, \
     cloudbreak_id, languagelink_id, propio_id, language, country, \
     payment_frequency, service_location, onboarding_status, \
     rate_per_minute, rate_per_hour, created_at, updated_at";

/// Postgres repository for interpreters.
#[derive(Debug, Clone)]
pub struct InterpreterRepository {
    pool: PgPool,
}

impl InterpreterRepository {
    /// Create a repository over a pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find by CRM record id.
    #[instrument(skip(self))]
    pub async fn find_by_record_id(&self, record_id: &str) -> StoreResult<Option<Interpreter>> {
        let row = sqlx::query_as::<_, Interpreter>(&format!(
            "SELECT {INTERPRETER_COLUMNS} FROM interpreters WHERE record_id = $1"
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Find by email.
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Interpreter>> {
        let row = sqlx::query_as::<_, Interpreter>(&format!(
            "SELECT {INTERPRETER_COLUMNS} FROM interpreters WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Find by employee id.
    #[instrument(skip(self))]
    pub async fn find_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<Interpreter>> {
        let row = sqlx::query_as::<_, Interpreter>(&format!(
            "SELECT {INTERPRETER_COLUMNS} FROM interpreters WHERE employee_id = $1"
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a new interpreter.
    #[instrument(skip(self, interpreter), fields(id = %interpreter.id))]
    pub async fn insert(&self, interpreter: &Interpreter) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO interpreters
                (id, record_id, contact_name, last_name, email, employee_id,
                 cloudbreak_id, languagelink_id, propio_id, language, country,
                 payment_frequency, service_location, onboarding_status,
                 rate_per_minute, rate_per_hour, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18)
            ",
        )
        .bind(&interpreter.id)
        .bind(&interpreter.record_id)
        .bind(&interpreter.contact_name)
        .bind(&interpreter.last_name)
        .bind(&interpreter.email)
        .bind(&interpreter.employee_id)
        .bind(&interpreter.cloudbreak_id)
        .bind(&interpreter.languagelink_id)
        .bind(&interpreter.propio_id)
        .bind(&interpreter.language)
        .bind(&interpreter.country)
        .bind(&interpreter.payment_frequency)
        .bind(&interpreter.service_location)
        .bind(&interpreter.onboarding_status)
        .bind(&interpreter.rate_per_minute)
        .bind(&interpreter.rate_per_hour)
        .bind(interpreter.created_at)
        .bind(interpreter.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Write back all mutable columns of an interpreter.
    #[instrument(skip(self, interpreter), fields(id = %interpreter.id))]
    pub async fn update(&self, interpreter: &Interpreter) -> StoreResult<()> {
        sqlx::query(
            r"
            UPDATE interpreters
            SET record_id = $2, contact_name = $3, last_name = $4, email = $5,
                employee_id = $6, cloudbreak_id = $7, languagelink_id = $8,
                propio_id = $9, language = $10, country = $11,
                payment_frequency = $12, service_location = $13,
                onboarding_status = $14, rate_per_minute = $15,
                rate_per_hour = $16, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(&interpreter.id)
        .bind(&interpreter.record_id)
        .bind(&interpreter.contact_name)
        .bind(&interpreter.last_name)
        .bind(&interpreter.email)
        .bind(&interpreter.employee_id)
        .bind(&interpreter.cloudbreak_id)
        .bind(&interpreter.languagelink_id)
        .bind(&interpreter.propio_id)
        .bind(&interpreter.language)
        .bind(&interpreter.country)
        .bind(&interpreter.payment_frequency)
        .bind(&interpreter.service_location)
        .bind(&interpreter.onboarding_status)
        .bind(&interpreter.rate_per_minute)
        .bind(&interpreter.rate_per_hour)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_interpreter_defaults() {
        let interpreter = Interpreter::new("int_1".to_string(), "Ana Lopez".to_string());
        assert_eq!(interpreter.id, "int_1");
        assert_eq!(interpreter.contact_name, "Ana Lopez");
        assert!(interpreter.record_id.is_none());
        assert!(interpreter.rate_per_minute.is_none());
    }
}
