//! Writes to the expense ledger: deduplicated feed ingestion plus manual entry,
//! editing and deletion. Every path here is gated by [`crate::access`].

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate, Utc};
use common::{FeedTransaction, IngestSummary};
use model::entities::{account, expense, person};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::access::{accessible_scopes, require_scope_access, resolve_scopes};
use crate::categorize::{categorize, is_income, is_known_category, merchant_label};
use crate::error::{ComputeError, Result};

/// Name reported for expenses not attributed to a person.
pub const JOINT: &str = "Joint";

/// Key pairs per existence query; keeps the OR chain well inside SQLite's expression depth.
const EXISTENCE_CHUNK: usize = 200;
/// Rows per multi-row INSERT; keeps bound parameters under SQLite's limit.
const INSERT_CHUNK: usize = 400;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2050;

/// A manually entered expense.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualExpense {
    pub scope_id: i32,
    pub person_id: Option<i32>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: String,
    pub merchant_name: Option<String>,
    pub notes: Option<String>,
}

/// Partial edit of one expense. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseUpdate {
    pub scope_id: Option<i32>,
    /// `Some(None)` makes the expense joint.
    pub person_id: Option<Option<i32>>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub adjusted_amount: Option<Decimal>,
    pub category: Option<String>,
    pub merchant_name: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// The same edit applied to many expenses at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkExpenseUpdate {
    pub expense_ids: Vec<i32>,
    pub category: Option<String>,
    pub person_id: Option<Option<i32>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub scope_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub source_type: Option<expense::SourceType>,
}

/// An expense with the display name of the person it is attributed to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRecord {
    pub expense: expense::Model,
    pub person_name: String,
}

struct DateParts {
    day: i32,
    month: i32,
    year: i32,
    day_of_week: String,
}

fn date_parts(date: NaiveDate) -> DateParts {
    DateParts {
        day: date.day() as i32,
        month: date.month() as i32,
        year: date.year(),
        day_of_week: date.format("%A").to_string(),
    }
}

fn check_category(category: &str) -> Result<()> {
    if is_known_category(category) {
        Ok(())
    } else {
        Err(ComputeError::Validation(format!("Unknown category '{category}'")))
    }
}

fn check_date(date: NaiveDate) -> Result<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(())
    } else {
        Err(ComputeError::Validation(format!(
            "Year must be between {MIN_YEAR} and {MAX_YEAR}"
        )))
    }
}

async fn check_person<C: ConnectionTrait>(db: &C, account_id: i32, person_id: Option<i32>) -> Result<()> {
    let Some(person_id) = person_id else {
        return Ok(());
    };
    let owned = person::Entity::find_by_id(person_id)
        .filter(person::Column::AccountId.eq(account_id))
        .one(db)
        .await?;
    match owned {
        Some(_) => Ok(()),
        None => Err(ComputeError::Validation(format!(
            "Person {person_id} does not belong to your account"
        ))),
    }
}

fn dedupe(ids: &[i32]) -> Result<BTreeSet<i32>> {
    let unique: BTreeSet<i32> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Err(ComputeError::Validation("No expense ids given".to_string()));
    }
    Ok(unique)
}

/// Loads every listed expense the account can reach, or fails if any is missing.
async fn load_owned<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    ids: &BTreeSet<i32>,
) -> Result<Vec<expense::Model>> {
    let scopes = accessible_scopes(db, account_id).await?;
    let rows = expense::Entity::find()
        .filter(expense::Column::Id.is_in(ids.iter().copied()))
        .filter(expense::Column::ScopeId.is_in(scopes.iter().copied()))
        .all(db)
        .await?;

    if rows.len() != ids.len() {
        warn!(account_id, requested = ids.len(), found = rows.len(), "Expenses missing or outside caller's scopes");
        return Err(ComputeError::NotFound(
            "Expense not found or not authorized".to_string(),
        ));
    }
    Ok(rows)
}

/// Inserts the feed transactions that are not yet in the ledger in one transaction.
///
/// Transactions already stored (by `(account_id, transaction_id)`) and repeats within
/// the batch are counted as skipped. A record without both key halves rejects the batch.
#[instrument(skip(db, transactions), fields(count = transactions.len()))]
pub async fn ingest_batch(
    db: &DatabaseConnection,
    scope_id: i32,
    transactions: &[FeedTransaction],
) -> Result<IngestSummary> {
    let txn = db.begin().await?;
    let summary = ingest_within(&txn, scope_id, None, transactions).await?;
    txn.commit().await?;
    Ok(summary)
}

/// Scope-checked entry point for pushing feed records directly.
pub async fn import_transactions(
    db: &DatabaseConnection,
    account_id: i32,
    scope_id: i32,
    transactions: &[FeedTransaction],
) -> Result<IngestSummary> {
    require_scope_access(db, account_id, scope_id).await?;
    ingest_batch(db, scope_id, transactions).await
}

/// [`ingest_batch`] against a caller-owned connection or transaction. New rows are
/// tagged with `feed_connection_id` when a sync delivered them.
pub(crate) async fn ingest_within<C: ConnectionTrait>(
    db: &C,
    scope_id: i32,
    feed_connection_id: Option<i32>,
    transactions: &[FeedTransaction],
) -> Result<IngestSummary> {
    if transactions.is_empty() {
        return Ok(IngestSummary::default());
    }

    let mut keys = Vec::with_capacity(transactions.len());
    for (index, transaction) in transactions.iter().enumerate() {
        let key = transaction.external_key().ok_or_else(|| {
            ComputeError::Validation(format!(
                "Transaction at position {index} is missing account_id or transaction_id"
            ))
        })?;
        keys.push(key);
    }

    let mut seen: HashSet<(String, String)> = HashSet::new();
    for chunk in keys.chunks(EXISTENCE_CHUNK) {
        let condition = chunk.iter().fold(Condition::any(), |any, (account_ref, transaction_ref)| {
            any.add(
                Condition::all()
                    .add(expense::Column::ExternalAccountId.eq(*account_ref))
                    .add(expense::Column::ExternalTransactionId.eq(*transaction_ref)),
            )
        });
        let existing: Vec<(String, String)> = expense::Entity::find()
            .select_only()
            .column(expense::Column::ExternalAccountId)
            .column(expense::Column::ExternalTransactionId)
            .filter(condition)
            .into_tuple()
            .all(db)
            .await?;
        seen.extend(existing);
    }
    debug!(existing = seen.len(), "Existing external keys found");

    let today = Utc::now().date_naive();
    let mut rows = Vec::new();
    let mut skipped = 0;
    for (transaction, (account_ref, transaction_ref)) in transactions.iter().zip(keys) {
        if !seen.insert((account_ref.to_string(), transaction_ref.to_string())) {
            skipped += 1;
            continue;
        }
        rows.push(feed_row(scope_id, feed_connection_id, transaction, today));
    }

    let inserted = rows.len();
    while !rows.is_empty() {
        let rest = rows.split_off(rows.len().min(INSERT_CHUNK));
        expense::Entity::insert_many(rows).exec(db).await?;
        rows = rest;
    }

    info!(scope_id, inserted, skipped, "Feed batch ingested");
    Ok(IngestSummary { inserted, skipped })
}

fn feed_row(
    scope_id: i32,
    feed_connection_id: Option<i32>,
    transaction: &FeedTransaction,
    today: NaiveDate,
) -> expense::ActiveModel {
    let date = transaction.date.unwrap_or(today);
    let parts = date_parts(date);
    let verdict = categorize(transaction);
    let pfc = transaction.personal_finance_category.clone().unwrap_or_default();

    expense::ActiveModel {
        scope_id: Set(scope_id),
        person_id: Set(None),
        day: Set(parts.day),
        month: Set(parts.month),
        year: Set(parts.year),
        expense_date: Set(date),
        day_of_week: Set(parts.day_of_week),
        amount: Set(transaction.amount),
        adjusted_amount: Set(Some(transaction.amount)),
        category: Set(verdict.category.to_string()),
        suggested_category: Set(Some(verdict.category.to_string())),
        category_confirmed: Set(false),
        is_income: Set(verdict.is_income),
        currency: Set(transaction.iso_currency_code.clone()),
        merchant_name: Set(merchant_label(transaction).map(String::from)),
        notes: Set(None),
        source_type: Set(expense::SourceType::Feed),
        feed_connection_id: Set(feed_connection_id),
        external_account_id: Set(transaction.account_id.clone()),
        external_transaction_id: Set(transaction.transaction_id.clone()),
        feed_category_id: Set(transaction.category_id.clone()),
        feed_pending: Set(transaction.pending),
        feed_pending_transaction_id: Set(transaction.pending_transaction_id.clone()),
        feed_category_confidence: Set(pfc.confidence_level),
        feed_category_primary: Set(pfc.primary),
        feed_category_detailed: Set(pfc.detailed),
        feed_merchant_name: Set(transaction.merchant_name.clone()),
        feed_name: Set(transaction.name.clone()),
        feed_transaction_type: Set(transaction.transaction_type.clone()),
        feed_authorized_date: Set(transaction.authorized_date),
        created_at: Set(today),
        updated_at: Set(today),
        ..Default::default()
    }
}

/// Records several manual expenses atomically. Categories are pre-confirmed.
#[instrument(skip(db, entries), fields(count = entries.len()))]
pub async fn record_manual_batch(
    db: &DatabaseConnection,
    account_id: i32,
    entries: Vec<ManualExpense>,
) -> Result<Vec<expense::Model>> {
    if entries.is_empty() {
        return Err(ComputeError::Validation("No expenses given".to_string()));
    }

    let owner = account::Entity::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("Account {account_id} not found")))?;
    let scopes = accessible_scopes(db, account_id).await?;

    for entry in &entries {
        if !scopes.contains(&entry.scope_id) {
            return Err(ComputeError::Forbidden(format!("No access to scope {}", entry.scope_id)));
        }
        check_date(entry.date)?;
        check_category(&entry.category)?;
        check_person(db, account_id, entry.person_id).await?;
    }

    let today = Utc::now().date_naive();
    let txn = db.begin().await?;
    let mut stored = Vec::with_capacity(entries.len());
    for entry in entries {
        let parts = date_parts(entry.date);
        let model = expense::ActiveModel {
            scope_id: Set(entry.scope_id),
            person_id: Set(entry.person_id),
            day: Set(parts.day),
            month: Set(parts.month),
            year: Set(parts.year),
            expense_date: Set(entry.date),
            day_of_week: Set(parts.day_of_week),
            amount: Set(entry.amount),
            adjusted_amount: Set(Some(entry.amount)),
            is_income: Set(is_income(&entry.category)),
            category: Set(entry.category),
            suggested_category: Set(None),
            category_confirmed: Set(true),
            currency: Set(Some(owner.currency.clone())),
            merchant_name: Set(entry.merchant_name),
            notes: Set(entry.notes),
            source_type: Set(expense::SourceType::Manual),
            created_at: Set(today),
            updated_at: Set(today),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        stored.push(model);
    }
    txn.commit().await?;

    info!(account_id, count = stored.len(), "Manual expenses recorded");
    Ok(stored)
}

/// Records one manual expense.
pub async fn record_manual(
    db: &DatabaseConnection,
    account_id: i32,
    entry: ManualExpense,
) -> Result<expense::Model> {
    record_manual_batch(db, account_id, vec![entry])
        .await?
        .pop()
        .ok_or_else(|| ComputeError::Validation("No expense recorded".to_string()))
}

/// Applies a partial edit. The category is always marked confirmed afterwards.
#[instrument(skip(db))]
pub async fn update_expense(
    db: &DatabaseConnection,
    account_id: i32,
    expense_id: i32,
    update: ExpenseUpdate,
) -> Result<expense::Model> {
    let current = load_owned(db, account_id, &BTreeSet::from([expense_id]))
        .await?
        .remove(0);

    if let Some(scope_id) = update.scope_id {
        require_scope_access(db, account_id, scope_id).await?;
    }
    if let Some(person_id) = update.person_id {
        check_person(db, account_id, person_id).await?;
    }
    if let Some(category) = &update.category {
        check_category(category)?;
    }
    if let Some(date) = update.date {
        check_date(date)?;
    }

    let category = update.category.clone().unwrap_or_else(|| current.category.clone());
    let mut active: expense::ActiveModel = current.into();

    if let Some(scope_id) = update.scope_id {
        active.scope_id = Set(scope_id);
    }
    if let Some(person_id) = update.person_id {
        active.person_id = Set(person_id);
    }
    if let Some(date) = update.date {
        let parts = date_parts(date);
        active.expense_date = Set(date);
        active.day = Set(parts.day);
        active.month = Set(parts.month);
        active.year = Set(parts.year);
        active.day_of_week = Set(parts.day_of_week);
    }
    if let Some(amount) = update.amount {
        active.amount = Set(amount);
    }
    if let Some(adjusted) = update.adjusted_amount {
        active.adjusted_amount = Set(Some(adjusted));
    }
    if let Some(merchant_name) = update.merchant_name {
        active.merchant_name = Set(merchant_name);
    }
    if let Some(notes) = update.notes {
        active.notes = Set(notes);
    }
    active.is_income = Set(is_income(&category));
    active.category = Set(category);
    active.category_confirmed = Set(true);
    active.updated_at = Set(Utc::now().date_naive());

    let updated = active.update(db).await?;
    info!(expense_id, "Expense updated");
    Ok(updated)
}

/// Applies the same category/person edit to every listed expense, all or nothing.
#[instrument(skip(db))]
pub async fn bulk_update_expenses(
    db: &DatabaseConnection,
    account_id: i32,
    update: BulkExpenseUpdate,
) -> Result<usize> {
    let ids = dedupe(&update.expense_ids)?;
    if let Some(category) = &update.category {
        check_category(category)?;
    }
    if let Some(person_id) = update.person_id {
        check_person(db, account_id, person_id).await?;
    }

    let txn = db.begin().await?;
    let rows = load_owned(&txn, account_id, &ids).await?;
    let today = Utc::now().date_naive();
    for row in rows {
        let category = update.category.clone().unwrap_or_else(|| row.category.clone());
        let mut active: expense::ActiveModel = row.into();
        if let Some(person_id) = update.person_id {
            active.person_id = Set(person_id);
        }
        active.is_income = Set(is_income(&category));
        active.category = Set(category);
        active.category_confirmed = Set(true);
        active.updated_at = Set(today);
        active.update(&txn).await?;
    }
    txn.commit().await?;

    info!(account_id, count = ids.len(), "Expenses bulk updated");
    Ok(ids.len())
}

/// Deletes every listed expense, or none if any is missing or out of reach.
#[instrument(skip(db))]
pub async fn delete_expenses(db: &DatabaseConnection, account_id: i32, expense_ids: &[i32]) -> Result<u64> {
    let ids = dedupe(expense_ids)?;

    let txn = db.begin().await?;
    load_owned(&txn, account_id, &ids).await?;
    let deleted = expense::Entity::delete_many()
        .filter(expense::Column::Id.is_in(ids.iter().copied()))
        .exec(&txn)
        .await?
        .rows_affected;
    txn.commit().await?;

    info!(account_id, deleted, "Expenses deleted");
    Ok(deleted)
}

/// Expenses in the caller's scopes, newest first.
pub async fn list_expenses<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    filter: ExpenseFilter,
) -> Result<Vec<ExpenseRecord>> {
    let scopes = resolve_scopes(db, account_id, filter.scope_id).await?;

    let mut query = expense::Entity::find().filter(expense::Column::ScopeId.is_in(scopes.iter().copied()));
    if let Some(start) = filter.start_date {
        query = query.filter(expense::Column::ExpenseDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(expense::Column::ExpenseDate.lte(end));
    }
    if let Some(category) = filter.category {
        query = query.filter(expense::Column::Category.eq(category));
    }
    if let Some(source_type) = filter.source_type {
        query = query.filter(expense::Column::SourceType.eq(source_type));
    }

    let rows = query
        .order_by_desc(expense::Column::ExpenseDate)
        .order_by_desc(expense::Column::Id)
        .find_also_related(person::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(expense, person)| ExpenseRecord {
            person_name: person.map_or_else(|| JOINT.to_string(), |person| person.name),
            expense,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{add_person, create_household, invite_member, respond_to_invite};
    use crate::testing::{date, feed_txn, new_account, personal_scope, setup_db};

    fn manual(scope_id: i32, category: &str, amount: i64) -> ManualExpense {
        ManualExpense {
            scope_id,
            person_id: None,
            date: date(2025, 3, 10),
            amount: Decimal::new(amount, 0),
            category: category.to_string(),
            merchant_name: Some("Corner Shop".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn reingesting_a_batch_skips_everything() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;

        let batch = vec![
            feed_txn(Decimal::new(8940, 2), "Uber Eats", "FOOD_AND_DRINK"),
            feed_txn(Decimal::new(1200, 2), "Whole Foods", "FOOD_AND_DRINK"),
            feed_txn(Decimal::new(4500, 2), "City Power", "UTILITIES"),
        ];

        let first = ingest_batch(&db, scope_id, &batch).await.unwrap();
        assert_eq!(first, IngestSummary { inserted: 3, skipped: 0 });

        let second = ingest_batch(&db, scope_id, &batch).await.unwrap();
        assert_eq!(second, IngestSummary { inserted: 0, skipped: 3 });

        let stored = list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn ingested_rows_are_categorized_and_unconfirmed() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;

        let mut uber = feed_txn(Decimal::new(8940, 2), "UBER EATS", "FOOD_AND_DRINK");
        uber.date = None;
        ingest_batch(&db, scope_id, &[uber]).await.unwrap();

        let stored = list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap();
        let row = &stored[0].expense;
        assert_eq!(row.category, "Taxi and Ride-Sharing");
        assert!(!row.is_income);
        assert!(!row.category_confirmed);
        assert_eq!(row.adjusted_amount, Some(row.amount));
        assert_eq!(row.source_type, expense::SourceType::Feed);
        assert_eq!(row.expense_date, Utc::now().date_naive());
        assert_eq!(row.feed_category_primary.as_deref(), Some("FOOD_AND_DRINK"));
        assert_eq!(stored[0].person_name, JOINT);
    }

    #[tokio::test]
    async fn repeats_within_a_batch_are_inserted_once() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;

        let txn = feed_txn(Decimal::new(500, 2), "Coffee", "FOOD_AND_DRINK");
        let summary = ingest_batch(&db, scope_id, &[txn.clone(), txn]).await.unwrap();
        assert_eq!(summary, IngestSummary { inserted: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn missing_key_rejects_whole_batch() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;

        let mut broken = feed_txn(Decimal::new(500, 2), "Coffee", "FOOD_AND_DRINK");
        broken.transaction_id = None;
        let batch = vec![feed_txn(Decimal::new(100, 2), "Bakery", "FOOD_AND_DRINK"), broken];

        let result = ingest_batch(&db, scope_id, &batch).await;
        assert!(matches!(result, Err(ComputeError::Validation(_))));
        assert!(list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_requires_scope_access() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let bob_scope = personal_scope(&db, bob.id).await;

        let batch = vec![feed_txn(Decimal::new(100, 2), "Bakery", "FOOD_AND_DRINK")];
        let result = import_transactions(&db, alice.id, bob_scope, &batch).await;
        assert!(matches!(result, Err(ComputeError::Forbidden(_))));
    }

    #[tokio::test]
    async fn manual_expenses_are_confirmed_and_use_account_currency() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;

        let stored = record_manual(&db, alice.id, manual(scope_id, "Groceries", 42)).await.unwrap();
        assert!(stored.category_confirmed);
        assert!(!stored.is_income);
        assert_eq!(stored.currency.as_deref(), Some("USD"));
        assert_eq!(stored.day_of_week, "Monday");
        assert_eq!((stored.day, stored.month, stored.year), (10, 3, 2025));
        assert!(stored.external_transaction_id.is_none());

        // Manual rows are never deduplicated
        record_manual(&db, alice.id, manual(scope_id, "Groceries", 42)).await.unwrap();
        assert_eq!(list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn manual_batch_is_atomic() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;

        let mut out_of_range = manual(scope_id, "Groceries", 5);
        out_of_range.date = date(1999, 12, 31);
        let result = record_manual_batch(&db, alice.id, vec![manual(scope_id, "Rent", 900), out_of_range]).await;
        assert!(matches!(result, Err(ComputeError::Validation(_))));

        let unknown = record_manual(&db, alice.id, manual(scope_id, "Yachts", 5)).await;
        assert!(matches!(unknown, Err(ComputeError::Validation(_))));

        assert!(list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_person_must_belong_to_caller() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let scope_id = personal_scope(&db, alice.id).await;
        let bobs_person = add_person(&db, bob.id, "Bobby").await.unwrap();

        let mut entry = manual(scope_id, "Groceries", 5);
        entry.person_id = Some(bobs_person.id);
        let result = record_manual(&db, alice.id, entry).await;
        assert!(matches!(result, Err(ComputeError::Validation(_))));
    }

    #[tokio::test]
    async fn update_confirms_category_and_recomputes_income() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;
        ingest_batch(&db, scope_id, &[feed_txn(Decimal::new(2500, 0), "ACME", "GENERAL_MERCHANDISE")])
            .await
            .unwrap();
        let row = list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap().remove(0).expense;
        assert!(!row.category_confirmed);

        // Notes only, category still confirmed
        let updated = update_expense(
            &db,
            alice.id,
            row.id,
            ExpenseUpdate {
                notes: Some(Some("checked".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.category_confirmed);
        assert_eq!(updated.category, "Miscellaneous");

        let updated = update_expense(
            &db,
            alice.id,
            row.id,
            ExpenseUpdate {
                category: Some("Income".to_string()),
                date: Some(date(2025, 2, 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.is_income);
        assert_eq!((updated.month, updated.day_of_week.as_str()), (2, "Saturday"));
        assert_eq!(updated.external_transaction_id, row.external_transaction_id);
    }

    #[tokio::test]
    async fn update_outside_scopes_is_not_found() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let alice_scope = personal_scope(&db, alice.id).await;
        let row = record_manual(&db, alice.id, manual(alice_scope, "Groceries", 5)).await.unwrap();

        let result = update_expense(&db, bob.id, row.id, ExpenseUpdate::default()).await;
        assert!(matches!(result, Err(ComputeError::NotFound(_))));

        let result = update_expense(&db, alice.id, 9999, ExpenseUpdate::default()).await;
        assert!(matches!(result, Err(ComputeError::NotFound(_))));
    }

    #[tokio::test]
    async fn household_members_share_expenses() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let smiths = create_household(&db, alice.id, "Smiths").await.unwrap();
        invite_member(&db, alice.id, smiths.id, "bob@example.com").await.unwrap();

        let row = record_manual(&db, alice.id, manual(smiths.id, "Groceries", 60)).await.unwrap();

        // Pending invitee sees nothing
        let pending_view = list_expenses(&db, bob.id, ExpenseFilter { scope_id: Some(smiths.id), ..Default::default() }).await;
        assert!(matches!(pending_view, Err(ComputeError::Forbidden(_))));

        respond_to_invite(&db, bob.id, smiths.id, true).await.unwrap();
        let bob_view = list_expenses(&db, bob.id, ExpenseFilter { scope_id: Some(smiths.id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(bob_view.len(), 1);
        assert_eq!(bob_view[0].expense.id, row.id);
    }

    #[tokio::test]
    async fn bulk_update_and_delete_are_all_or_nothing() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let alice_scope = personal_scope(&db, alice.id).await;
        let bob_scope = personal_scope(&db, bob.id).await;

        let a = record_manual(&db, alice.id, manual(alice_scope, "Groceries", 10)).await.unwrap();
        let b = record_manual(&db, alice.id, manual(alice_scope, "Rent", 900)).await.unwrap();
        let foreign = record_manual(&db, bob.id, manual(bob_scope, "Rent", 800)).await.unwrap();

        let mixed = bulk_update_expenses(
            &db,
            alice.id,
            BulkExpenseUpdate {
                expense_ids: vec![a.id, foreign.id],
                category: Some("Alcohol".to_string()),
                person_id: None,
            },
        )
        .await;
        assert!(matches!(mixed, Err(ComputeError::NotFound(_))));

        let updated = bulk_update_expenses(
            &db,
            alice.id,
            BulkExpenseUpdate {
                expense_ids: vec![a.id, b.id, a.id],
                category: Some("Income".to_string()),
                person_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated, 2);
        let rows = list_expenses(&db, alice.id, ExpenseFilter { category: Some("Income".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.expense.is_income && r.expense.category_confirmed));

        let denied = delete_expenses(&db, alice.id, &[a.id, foreign.id]).await;
        assert!(matches!(denied, Err(ComputeError::NotFound(_))));
        assert_eq!(list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap().len(), 2);

        let deleted = delete_expenses(&db, alice.id, &[a.id, b.id]).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(list_expenses(&db, alice.id, ExpenseFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_date_and_reports_person() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope_id = personal_scope(&db, alice.id).await;
        let carol = add_person(&db, alice.id, "Carol").await.unwrap();

        let mut early = manual(scope_id, "Groceries", 10);
        early.date = date(2025, 1, 5);
        let mut late = manual(scope_id, "Groceries", 20);
        late.person_id = Some(carol.id);
        record_manual_batch(&db, alice.id, vec![early, late]).await.unwrap();

        let march = list_expenses(
            &db,
            alice.id,
            ExpenseFilter {
                start_date: Some(date(2025, 3, 1)),
                end_date: Some(date(2025, 3, 31)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].person_name, "Carol");

        let feed_only = list_expenses(
            &db,
            alice.id,
            ExpenseFilter {
                source_type: Some(expense::SourceType::Feed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(feed_only.is_empty());
    }
}
