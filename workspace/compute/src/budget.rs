//! Budget analytics over the ledger: trailing category averages, current-month
//! progress against targets, and month-to-date spending pace.
//!
//! Income rows never count as spending. Amounts use the adjusted amount when set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Datelike, Months, NaiveDate, Utc};
use common::{CategoryAverage, CategoryProgress, SpendingComparison};
use model::entities::category_target::{self, EVERYTHING_ELSE};
use model::entities::expense;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use tracing::{debug, info, instrument};

use crate::access::{require_scope_access, resolve_scopes};
use crate::categorize::is_known_category;
use crate::error::{ComputeError, Result};

/// How many categories the averages report keeps.
pub const TOP_CATEGORIES: usize = 10;
/// Length of the trailing window, in months.
pub const HISTORY_MONTHS: u32 = 12;

/// One entry of a target set being saved.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetInput {
    pub category_name: String,
    pub target_amount: Decimal,
}

fn effective_amount(row: &expense::Model) -> Decimal {
    row.adjusted_amount.unwrap_or(row.amount)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn days_in_month(date: NaiveDate) -> u32 {
    let first = first_of_month(date);
    first
        .checked_add_months(Months::new(1))
        .map(|next| (next - first).num_days() as u32)
        .unwrap_or(31)
}

fn percentage(spent: Decimal, target: Decimal) -> Decimal {
    if target.is_zero() {
        Decimal::ZERO
    } else {
        (spent * Decimal::ONE_HUNDRED / target).round_dp(2)
    }
}

/// Computes budget analytics relative to a fixed "today".
#[derive(Debug, Clone)]
pub struct BudgetComputer {
    today: NaiveDate,
}

impl Default for BudgetComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetComputer {
    pub fn new() -> Self {
        Self::new_with_today(Utc::now().date_naive())
    }

    pub fn new_with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Non-income expenses in `scopes` dated within `[start, end]`.
    async fn spending<C: ConnectionTrait>(
        &self,
        db: &C,
        scopes: &BTreeSet<i32>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<expense::Model>> {
        let rows = expense::Entity::find()
            .filter(expense::Column::ScopeId.is_in(scopes.iter().copied()))
            .filter(expense::Column::IsIncome.eq(false))
            .filter(expense::Column::ExpenseDate.gte(start))
            .filter(expense::Column::ExpenseDate.lte(end))
            .all(db)
            .await?;
        debug!(count = rows.len(), %start, %end, "Loaded spending rows");
        Ok(rows)
    }

    fn current_month(&self) -> (NaiveDate, NaiveDate) {
        let first = first_of_month(self.today);
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.today);
        (first, last)
    }

    /// Average monthly spend per category over the trailing twelve months, highest first.
    ///
    /// Every category is divided by the same number: the count of distinct months in the
    /// window that saw any spending at all.
    #[instrument(skip(self, db))]
    pub async fn category_averages<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: i32,
        scope_id: Option<i32>,
    ) -> Result<Vec<CategoryAverage>> {
        let scopes = resolve_scopes(db, account_id, scope_id).await?;
        let start = self
            .today
            .checked_sub_months(Months::new(HISTORY_MONTHS))
            .unwrap_or(self.today);
        let rows = self.spending(db, &scopes, start, self.today).await?;

        let mut totals: HashMap<String, Decimal> = HashMap::new();
        let mut months: HashSet<(i32, i32)> = HashSet::new();
        for row in &rows {
            *totals.entry(row.category.clone()).or_default() += effective_amount(row);
            months.insert((row.year, row.month));
        }

        let active_months = months.len().max(1) as u32;
        let divisor = Decimal::from(active_months);
        let mut averages: Vec<CategoryAverage> = totals
            .into_iter()
            .map(|(category, total)| CategoryAverage {
                monthly_average: (total / divisor).round_dp(2),
                category,
                total,
                active_months,
            })
            .collect();

        averages.sort_by(|a, b| {
            b.monthly_average
                .cmp(&a.monthly_average)
                .then_with(|| a.category.cmp(&b.category))
        });
        averages.truncate(TOP_CATEGORIES);
        Ok(averages)
    }

    /// Current-month progress for each active target, followed by the "Everything Else"
    /// records covering untargeted categories.
    #[instrument(skip(self, db))]
    pub async fn category_progress<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: i32,
        scope_id: Option<i32>,
    ) -> Result<Vec<CategoryProgress>> {
        let scopes = resolve_scopes(db, account_id, scope_id).await?;
        let targets = active_targets(db, account_id, &scopes).await?;
        let (start, end) = self.current_month();
        let rows = self.spending(db, &scopes, start, end).await?;

        let mut spent_by_key: HashMap<(i32, &str), Decimal> = HashMap::new();
        for row in &rows {
            *spent_by_key.entry((row.scope_id, row.category.as_str())).or_default() += effective_amount(row);
        }

        let (catch_all, regular): (Vec<_>, Vec<_>) =
            targets.iter().partition(|target| target.is_everything_else());

        let targeted: HashSet<(i32, &str)> = regular
            .iter()
            .map(|target| (target.scope_id, target.category_name.as_str()))
            .collect();

        let mut progress: Vec<CategoryProgress> = regular
            .iter()
            .map(|target| {
                let spent = spent_by_key
                    .get(&(target.scope_id, target.category_name.as_str()))
                    .copied()
                    .unwrap_or_default();
                CategoryProgress {
                    scope_id: Some(target.scope_id),
                    category: target.category_name.clone(),
                    target_amount: target.target_amount,
                    spent,
                    remaining: target.target_amount - spent,
                    progress_percentage: percentage(spent, target.target_amount),
                    is_over_budget: spent > target.target_amount,
                    is_everything_else: false,
                    has_target: true,
                }
            })
            .collect();
        progress.sort_by(|a, b| {
            b.progress_percentage
                .cmp(&a.progress_percentage)
                .then_with(|| a.category.cmp(&b.category))
        });

        // Untargeted spend, per scope
        let mut untargeted: BTreeMap<i32, Decimal> = BTreeMap::new();
        for (&(scope, category), &spent) in &spent_by_key {
            if !targeted.contains(&(scope, category)) {
                *untargeted.entry(scope).or_default() += spent;
            }
        }

        let mut covered = HashSet::new();
        for target in &catch_all {
            covered.insert(target.scope_id);
            let spent = untargeted.get(&target.scope_id).copied().unwrap_or_default();
            progress.push(CategoryProgress {
                scope_id: Some(target.scope_id),
                category: EVERYTHING_ELSE.to_string(),
                target_amount: target.target_amount,
                spent,
                remaining: target.target_amount - spent,
                progress_percentage: percentage(spent, target.target_amount),
                is_over_budget: spent > target.target_amount,
                is_everything_else: true,
                has_target: true,
            });
        }

        let rest: Decimal = untargeted
            .iter()
            .filter(|(scope, _)| !covered.contains(*scope))
            .map(|(_, spent)| *spent)
            .sum();
        if catch_all.is_empty() || !rest.is_zero() {
            progress.push(CategoryProgress {
                scope_id: None,
                category: EVERYTHING_ELSE.to_string(),
                target_amount: Decimal::ZERO,
                spent: rest,
                remaining: -rest,
                progress_percentage: Decimal::ZERO,
                is_over_budget: false,
                is_everything_else: true,
                has_target: false,
            });
        }

        Ok(progress)
    }

    /// Month-to-date spending against the average of the previous twelve months.
    ///
    /// Only months with spending count towards the average. Returns `None` when there
    /// is no such month.
    #[instrument(skip(self, db))]
    pub async fn spending_comparison<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: i32,
        scope_id: Option<i32>,
    ) -> Result<Option<SpendingComparison>> {
        let scopes = resolve_scopes(db, account_id, scope_id).await?;
        let (month_start, month_end) = self.current_month();
        let history_start = month_start
            .checked_sub_months(Months::new(HISTORY_MONTHS))
            .unwrap_or(month_start);
        let rows = self.spending(db, &scopes, history_start, month_end).await?;

        let mut current_month_total = Decimal::ZERO;
        let mut historical_total = Decimal::ZERO;
        // A month is active when it has any qualifying row, even if the rows net to zero
        let mut active_months: BTreeSet<(i32, i32)> = BTreeSet::new();
        for row in &rows {
            if row.expense_date >= month_start {
                current_month_total += effective_amount(row);
            } else {
                historical_total += effective_amount(row);
                active_months.insert((row.year, row.month));
            }
        }

        if active_months.is_empty() {
            debug!(account_id, "No spending history to compare against");
            return Ok(None);
        }

        let historical_months = active_months.len() as u32;
        let average = historical_total / Decimal::from(historical_months);
        let day_of_month = self.today.day();
        let days = days_in_month(self.today);
        let expected = average * Decimal::from(day_of_month) / Decimal::from(days);

        Ok(Some(SpendingComparison {
            current_month_total,
            historical_monthly_average: average.round_dp(2),
            expected_to_date: expected.round_dp(2),
            difference: (current_month_total - expected).round_dp(2),
            projected_month_total: (current_month_total / Decimal::from(day_of_month) * Decimal::from(days))
                .round_dp(2),
            day_of_month,
            days_in_month: days,
            historical_months,
        }))
    }
}

async fn active_targets<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    scopes: &BTreeSet<i32>,
) -> Result<Vec<category_target::Model>> {
    Ok(category_target::Entity::find()
        .filter(category_target::Column::AccountId.eq(account_id))
        .filter(category_target::Column::ScopeId.is_in(scopes.iter().copied()))
        .filter(category_target::Column::IsActive.eq(true))
        .order_by_asc(category_target::Column::ScopeId)
        .order_by_asc(category_target::Column::CategoryName)
        .all(db)
        .await?)
}

/// The account's active targets, across all its scopes or narrowed to one.
pub async fn get_category_targets<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    scope_id: Option<i32>,
) -> Result<Vec<category_target::Model>> {
    let scopes = resolve_scopes(db, account_id, scope_id).await?;
    active_targets(db, account_id, &scopes).await
}

/// Replaces the account's active targets in `scope_id` with `targets`.
#[instrument(skip(db, targets), fields(count = targets.len()))]
pub async fn save_category_targets(
    db: &DatabaseConnection,
    account_id: i32,
    scope_id: i32,
    targets: Vec<TargetInput>,
) -> Result<Vec<category_target::Model>> {
    require_scope_access(db, account_id, scope_id).await?;

    let mut names = HashSet::new();
    for target in &targets {
        let name = target.category_name.as_str();
        if name.trim().is_empty() {
            return Err(ComputeError::Validation("Category name must not be empty".to_string()));
        }
        if name != EVERYTHING_ELSE && !is_known_category(name) {
            return Err(ComputeError::Validation(format!("Unknown category '{name}'")));
        }
        if !names.insert(name) {
            return Err(ComputeError::Validation(format!("Duplicate target for '{name}'")));
        }
        if target.target_amount < Decimal::ZERO {
            return Err(ComputeError::Validation(format!(
                "Target for '{name}' must not be negative"
            )));
        }
    }

    let today = Utc::now().date_naive();
    let txn = db.begin().await?;
    let retired = category_target::Entity::update_many()
        .col_expr(category_target::Column::IsActive, Expr::value(false))
        .filter(category_target::Column::AccountId.eq(account_id))
        .filter(category_target::Column::ScopeId.eq(scope_id))
        .filter(category_target::Column::IsActive.eq(true))
        .exec(&txn)
        .await?
        .rows_affected;

    let mut saved = Vec::with_capacity(targets.len());
    for target in targets {
        let model = category_target::ActiveModel {
            account_id: Set(account_id),
            scope_id: Set(scope_id),
            category_name: Set(target.category_name),
            target_amount: Set(target.target_amount),
            is_active: Set(true),
            created_at: Set(today),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        saved.push(model);
    }
    txn.commit().await?;

    info!(account_id, scope_id, retired, saved = saved.len(), "Category targets replaced");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{create_household, invite_member, respond_to_invite};
    use crate::testing::{date, new_account, personal_scope, setup_db, spend};

    fn target(category: &str, amount: i64) -> TargetInput {
        TargetInput {
            category_name: category.to_string(),
            target_amount: Decimal::new(amount, 0),
        }
    }

    fn dec(amount: i64) -> Decimal {
        Decimal::new(amount, 0)
    }

    #[tokio::test]
    async fn averages_divide_by_active_months() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        spend(&db, scope, date(2025, 1, 5), "Groceries", dec(100)).await;
        spend(&db, scope, date(2025, 2, 5), "Groceries", dec(200)).await;
        spend(&db, scope, date(2025, 2, 6), "Rent", dec(900)).await;
        spend(&db, scope, date(2025, 3, 1), "Alcohol", dec(30)).await;
        spend(&db, scope, date(2025, 3, 2), "Income", dec(5000)).await;
        // Outside the trailing window
        spend(&db, scope, date(2024, 1, 10), "Groceries", dec(999)).await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 20));
        let averages = computer.category_averages(&db, alice.id, None).await.unwrap();

        let names: Vec<&str> = averages.iter().map(|a| a.category.as_str()).collect();
        assert_eq!(names, vec!["Rent", "Groceries", "Alcohol"]);
        assert_eq!(averages[0].monthly_average, dec(300));
        assert_eq!(averages[1].total, dec(300));
        assert_eq!(averages[1].monthly_average, dec(100));
        assert_eq!(averages[2].monthly_average, dec(10));
        assert!(averages.iter().all(|a| a.active_months == 3));
    }

    #[tokio::test]
    async fn averages_keep_top_ten() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        for (index, category) in crate::categorize::CATEGORIES.iter().take(12).enumerate() {
            spend(&db, scope, date(2025, 3, 1), category, dec(index as i64 + 1)).await;
        }

        let computer = BudgetComputer::new_with_today(date(2025, 3, 20));
        let averages = computer.category_averages(&db, alice.id, None).await.unwrap();
        assert_eq!(averages.len(), TOP_CATEGORIES);
        assert_eq!(averages[0].monthly_average, dec(12));
    }

    #[tokio::test]
    async fn progress_reports_over_budget_target_and_everything_else() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        save_category_targets(&db, alice.id, scope, vec![target("Groceries", 400), target("Rent", 1000)])
            .await
            .unwrap();

        spend(&db, scope, date(2025, 3, 2), "Groceries", dec(200)).await;
        spend(&db, scope, date(2025, 3, 9), "Groceries", dec(250)).await;
        spend(&db, scope, date(2025, 3, 3), "Entertainment", dec(30)).await;
        spend(&db, scope, date(2025, 2, 28), "Groceries", dec(75)).await;
        spend(&db, scope, date(2025, 3, 1), "Income", dec(3000)).await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 15));
        let progress = computer.category_progress(&db, alice.id, None).await.unwrap();
        assert_eq!(progress.len(), 3);

        let groceries = &progress[0];
        assert_eq!(groceries.category, "Groceries");
        assert_eq!(groceries.spent, dec(450));
        assert_eq!(groceries.progress_percentage, Decimal::new(1125, 1));
        assert_eq!(groceries.remaining, dec(-50));
        assert!(groceries.is_over_budget);

        let rent = &progress[1];
        assert_eq!(rent.spent, Decimal::ZERO);
        assert_eq!(rent.progress_percentage, Decimal::ZERO);
        assert!(!rent.is_over_budget);

        let rest = &progress[2];
        assert!(rest.is_everything_else);
        assert!(!rest.has_target);
        assert_eq!(rest.spent, dec(30));
        assert_eq!(rest.target_amount, Decimal::ZERO);
        assert_eq!(rest.remaining, dec(-30));
        assert!(!rest.is_over_budget);
    }

    #[tokio::test]
    async fn everything_else_is_always_present() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 15));
        let progress = computer.category_progress(&db, alice.id, None).await.unwrap();
        assert_eq!(progress.len(), 1);
        assert!(progress[0].is_everything_else);
        assert_eq!(progress[0].spent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn explicit_everything_else_target_sets_the_ceiling() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        save_category_targets(
            &db,
            alice.id,
            scope,
            vec![target("Groceries", 400), target(EVERYTHING_ELSE, 200)],
        )
        .await
        .unwrap();
        spend(&db, scope, date(2025, 3, 2), "Groceries", dec(100)).await;
        spend(&db, scope, date(2025, 3, 3), "Entertainment", dec(50)).await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 15));
        let progress = computer.category_progress(&db, alice.id, Some(scope)).await.unwrap();
        assert_eq!(progress.len(), 2);

        let rest = progress.last().unwrap();
        assert!(rest.is_everything_else && rest.has_target);
        assert_eq!(rest.scope_id, Some(scope));
        assert_eq!(rest.spent, dec(50));
        assert_eq!(rest.remaining, dec(150));
        assert_eq!(rest.progress_percentage, dec(25));
    }

    #[tokio::test]
    async fn progress_is_limited_to_accessible_scopes() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let smiths = create_household(&db, alice.id, "Smiths").await.unwrap();
        invite_member(&db, alice.id, smiths.id, "bob@example.com").await.unwrap();

        spend(&db, smiths.id, date(2025, 3, 2), "Groceries", dec(80)).await;
        let computer = BudgetComputer::new_with_today(date(2025, 3, 15));

        let pending = computer.category_progress(&db, bob.id, Some(smiths.id)).await;
        assert!(matches!(pending, Err(ComputeError::Forbidden(_))));
        let all = computer.category_progress(&db, bob.id, None).await.unwrap();
        assert_eq!(all[0].spent, Decimal::ZERO);

        respond_to_invite(&db, bob.id, smiths.id, true).await.unwrap();
        let all = computer.category_progress(&db, bob.id, None).await.unwrap();
        assert_eq!(all[0].spent, dec(80));
    }

    #[tokio::test]
    async fn comparison_prorates_the_historical_average() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        spend(&db, scope, date(2025, 1, 10), "Groceries", dec(310)).await;
        spend(&db, scope, date(2025, 2, 10), "Rent", dec(620)).await;
        spend(&db, scope, date(2025, 2, 11), "Income", dec(4000)).await;
        spend(&db, scope, date(2025, 3, 4), "Groceries", dec(150)).await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 10));
        let comparison = computer
            .spending_comparison(&db, alice.id, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(comparison.historical_months, 2);
        assert_eq!(comparison.historical_monthly_average, dec(465));
        assert_eq!(comparison.current_month_total, dec(150));
        assert_eq!(comparison.expected_to_date, dec(150));
        assert_eq!(comparison.difference, Decimal::ZERO);
        assert_eq!(comparison.projected_month_total, dec(465));
        assert_eq!((comparison.day_of_month, comparison.days_in_month), (10, 31));
    }

    #[tokio::test]
    async fn refunded_month_still_counts_as_active() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        spend(&db, scope, date(2025, 1, 8), "Groceries", dec(100)).await;
        spend(&db, scope, date(2025, 1, 20), "Groceries", dec(-100)).await;
        spend(&db, scope, date(2025, 2, 12), "Groceries", dec(300)).await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 10));
        let comparison = computer
            .spending_comparison(&db, alice.id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(comparison.historical_months, 2);
        assert_eq!(comparison.historical_monthly_average, dec(150));

        // Both analytics agree on what an active month is
        let averages = computer.category_averages(&db, alice.id, None).await.unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].active_months, comparison.historical_months);
        assert_eq!(averages[0].monthly_average, dec(150));
    }

    #[tokio::test]
    async fn comparison_is_absent_without_history() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;
        spend(&db, scope, date(2025, 3, 4), "Groceries", dec(150)).await;

        let computer = BudgetComputer::new_with_today(date(2025, 3, 10));
        assert!(computer.spending_comparison(&db, alice.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_targets_replaces_the_active_set() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let scope = personal_scope(&db, alice.id).await;

        save_category_targets(&db, alice.id, scope, vec![target("Groceries", 400), target("Rent", 1000)])
            .await
            .unwrap();
        save_category_targets(&db, alice.id, scope, vec![target("Alcohol", 50)])
            .await
            .unwrap();

        let active = get_category_targets(&db, alice.id, None).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].category_name, "Alcohol");

        let all = category_target::Entity::find().all(&db).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn invalid_target_sets_are_rejected() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let scope = personal_scope(&db, alice.id).await;

        for bad in [
            vec![target("Yachts", 10)],
            vec![target("Groceries", 10), target("Groceries", 20)],
            vec![target("Groceries", -1)],
            vec![target(" ", 1)],
        ] {
            let result = save_category_targets(&db, alice.id, scope, bad).await;
            assert!(matches!(result, Err(ComputeError::Validation(_))));
        }

        let foreign = save_category_targets(&db, bob.id, scope, vec![target("Groceries", 10)]).await;
        assert!(matches!(foreign, Err(ComputeError::Forbidden(_))));
    }
}
