//! Transport-layer types shared between the compute engines and the HTTP handlers.
//! Everything here is plain serde data so it can travel over the wire unchanged.

mod budget;
mod feed;
mod ledger;

pub use budget::{CategoryAverage, CategoryProgress, SpendingComparison};
pub use feed::{FeedPage, FeedTransaction, PersonalFinanceCategory, RemovedTransaction};
pub use ledger::{IngestSummary, SyncResult};

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper used by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

/// Distinguishes an absent field from an explicit `null` in partial updates.
///
/// Use with `#[serde(default, deserialize_with = "common::double_option")]` on an
/// `Option<Option<T>>` field: missing → `None`, `null` → `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        person_id: Option<Option<i32>>,
    }

    #[test]
    fn double_option_separates_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.person_id, None);

        let cleared: Patch = serde_json::from_str(r#"{"person_id": null}"#).unwrap();
        assert_eq!(cleared.person_id, Some(None));

        let set: Patch = serde_json::from_str(r#"{"person_id": 7}"#).unwrap();
        assert_eq!(set.person_id, Some(Some(7)));
    }

    #[test]
    fn api_response_shape() {
        let response = ApiResponse {
            data: vec![1, 2],
            message: "ok".to_string(),
            success: true,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"][1], 2);
        assert_eq!(json["success"], true);
    }
}
