use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Provider-assigned category codes, e.g. primary `FOOD_AND_DRINK`,
/// detailed `FOOD_AND_DRINK_GROCERIES`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PersonalFinanceCategory {
    pub primary: Option<String>,
    pub detailed: Option<String>,
    pub confidence_level: Option<String>,
}

/// One transaction record as delivered by the external feed.
///
/// `account_id` and `transaction_id` together identify the record across syncs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedTransaction {
    pub account_id: Option<String>,
    pub transaction_id: Option<String>,
    /// Positive for money leaving the account.
    pub amount: Decimal,
    pub iso_currency_code: Option<String>,
    /// Posting date; ingestion falls back to today when missing.
    pub date: Option<NaiveDate>,
    pub authorized_date: Option<NaiveDate>,
    pub merchant_name: Option<String>,
    pub name: Option<String>,
    pub category_id: Option<String>,
    pub personal_finance_category: Option<PersonalFinanceCategory>,
    pub pending: Option<bool>,
    pub pending_transaction_id: Option<String>,
    pub transaction_type: Option<String>,
}

impl FeedTransaction {
    /// The deduplication key, if both halves are present and non-empty.
    pub fn external_key(&self) -> Option<(&str, &str)> {
        match (self.account_id.as_deref(), self.transaction_id.as_deref()) {
            (Some(account), Some(transaction)) if !account.is_empty() && !transaction.is_empty() => {
                Some((account, transaction))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RemovedTransaction {
    pub transaction_id: String,
    pub account_id: Option<String>,
}

/// A single page of the incremental change stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedPage {
    #[serde(default)]
    pub added: Vec<FeedTransaction>,
    #[serde(default)]
    pub modified: Vec<FeedTransaction>,
    #[serde(default)]
    pub removed: Vec<RemovedTransaction>,
    pub next_cursor: String,
    #[serde(default)]
    pub has_more: bool,
}
