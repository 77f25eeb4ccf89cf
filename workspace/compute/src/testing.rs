//! Shared fixtures for the compute tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use common::{FeedTransaction, PersonalFinanceCategory};
use migration::{Migrator, MigratorTrait};
use model::entities::{account, expense};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

use crate::access::{NewAccount, accessible_scopes, provision_account};

static COUNTER: AtomicU64 = AtomicU64::new(1);

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Registers `name` with email `{name}@example.com`.
pub async fn new_account(db: &DatabaseConnection, name: &str) -> account::Model {
    provision_account(
        db,
        NewAccount {
            account_name: name.to_string(),
            email: Some(format!("{name}@example.com")),
            display_name: None,
            currency: "USD".to_string(),
        },
    )
    .await
    .expect("Failed to provision account")
}

pub async fn personal_scope(db: &DatabaseConnection, account_id: i32) -> i32 {
    *accessible_scopes(db, account_id)
        .await
        .unwrap()
        .first()
        .expect("Account has no scope")
}

/// A feed record with a fresh transaction id.
pub fn feed_txn(amount: Decimal, merchant: &str, primary: &str) -> FeedTransaction {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    FeedTransaction {
        account_id: Some("acc-checking".to_string()),
        transaction_id: Some(format!("txn-{n}")),
        amount,
        iso_currency_code: Some("USD".to_string()),
        date: Some(date(2025, 3, 14)),
        merchant_name: Some(merchant.to_string()),
        name: Some(merchant.to_uppercase()),
        personal_finance_category: Some(PersonalFinanceCategory {
            primary: Some(primary.to_string()),
            detailed: None,
            confidence_level: Some("HIGH".to_string()),
        }),
        pending: Some(false),
        ..Default::default()
    }
}

/// Writes a confirmed manual expense straight to the table.
pub async fn spend(
    db: &DatabaseConnection,
    scope_id: i32,
    on: NaiveDate,
    category: &str,
    amount: Decimal,
) -> expense::Model {
    use chrono::Datelike;

    expense::ActiveModel {
        scope_id: Set(scope_id),
        person_id: Set(None),
        day: Set(on.day() as i32),
        month: Set(on.month() as i32),
        year: Set(on.year()),
        expense_date: Set(on),
        day_of_week: Set(on.format("%A").to_string()),
        amount: Set(amount),
        adjusted_amount: Set(Some(amount)),
        category: Set(category.to_string()),
        suggested_category: Set(None),
        category_confirmed: Set(true),
        is_income: Set(crate::categorize::is_income(category)),
        currency: Set(Some("USD".to_string())),
        merchant_name: Set(None),
        notes: Set(None),
        source_type: Set(expense::SourceType::Manual),
        created_at: Set(on),
        updated_at: Set(on),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert expense")
}
