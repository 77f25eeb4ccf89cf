pub mod access;
pub mod budget;
pub mod categorize;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod sync;

#[cfg(test)]
mod testing;

use chrono::NaiveDate;
use budget::BudgetComputer;

/// Returns the budget computer used by the service.
///
/// `today` pins the reference date; `None` uses the current date.
pub fn default_compute(today: Option<NaiveDate>) -> BudgetComputer {
    match today {
        Some(today) => BudgetComputer::new_with_today(today),
        None => BudgetComputer::new(),
    }
}
