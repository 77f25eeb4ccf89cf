use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Average monthly spend in one category over the trailing year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryAverage {
    pub category: String,
    pub total: Decimal,
    /// `total` divided by the number of months that had any spending.
    pub monthly_average: Decimal,
    pub active_months: u32,
}

/// Current-month progress against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryProgress {
    pub scope_id: Option<i32>,
    pub category: String,
    pub target_amount: Decimal,
    pub spent: Decimal,
    /// `target_amount - spent`; negative once over budget.
    pub remaining: Decimal,
    /// `spent / target_amount * 100`, or 0 when the target is 0.
    pub progress_percentage: Decimal,
    pub is_over_budget: bool,
    /// Marks the catch-all record for categories without their own target.
    pub is_everything_else: bool,
    /// False when no explicit target backs this record.
    pub has_target: bool,
}

/// Month-to-date spending compared with the historical monthly average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpendingComparison {
    pub current_month_total: Decimal,
    pub historical_monthly_average: Decimal,
    /// Average prorated to the current day of the month.
    pub expected_to_date: Decimal,
    /// `current_month_total - expected_to_date`
    pub difference: Decimal,
    /// Linear extrapolation of the current pace to the end of the month.
    pub projected_month_total: Decimal,
    pub day_of_month: u32,
    pub days_in_month: u32,
    pub historical_months: u32,
}
