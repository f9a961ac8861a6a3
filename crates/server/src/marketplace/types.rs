//! Wire types for the marketplace Open Platform API.
//!
//! Shop endpoints wrap their payload in an envelope:
//!
//! ```json
//! { "error": "", "message": "", "request_id": "...", "response": { ... } }
//! ```
//!
//! A non-empty `error` means the call was rejected even when the HTTP status
//! is 200. Item detail records are kept as raw JSON here and decoded one at a
//! time by the merge engine, so a single malformed record cannot sink a page.

use marketsync_core::ItemId;
use serde::{Deserialize, Serialize};

/// Standard response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
    pub response: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// The error code, if the call was rejected.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        (!self.error.is_empty()).then_some(self.error.as_str())
    }
}

/// `get_item_list` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemListPage {
    #[serde(default)]
    pub item: Vec<ItemListEntry>,
    #[serde(default)]
    pub total_count: Option<i64>,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub next_offset: Option<i64>,
}

impl ItemListPage {
    /// IDs listed on this page, in order.
    #[must_use]
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.item.iter().map(|entry| entry.item_id).collect()
    }
}

/// One entry of `get_item_list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemListEntry {
    pub item_id: ItemId,
    #[serde(default)]
    pub item_status: Option<String>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

/// `get_item_base_info` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDetailPage {
    #[serde(default)]
    pub item_list: Option<Vec<serde_json::Value>>,
}

/// A full item record from `get_item_base_info`.
///
/// Every field is optional on the wire; required fields are enforced during
/// normalization.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteItem {
    pub item_id: Option<i64>,
    pub category_id: Option<i64>,
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub item_sku: Option<String>,
    pub create_time: Option<i64>,
    pub update_time: Option<i64>,
    pub attribute_list: Option<Vec<serde_json::Value>>,
    pub price_info: Option<Vec<RemotePriceInfo>>,
    pub stock_info_v2: Option<RemoteStockInfo>,
    pub image: Option<RemoteImage>,
    pub weight: Option<RemoteWeight>,
    pub dimension: Option<RemoteDimension>,
    pub logistic_info: Option<Vec<serde_json::Value>>,
    pub condition: Option<String>,
    pub item_status: Option<String>,
    pub has_model: Option<bool>,
    pub brand: Option<RemoteBrand>,
    pub models: Option<Vec<serde_json::Value>>,
    pub tier_variation: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemotePriceInfo {
    pub currency: Option<String>,
    pub original_price: Option<f64>,
    pub current_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteStockInfo {
    pub summary_info: Option<RemoteStockSummary>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteStockSummary {
    pub total_reserved_stock: Option<i64>,
    pub total_available_stock: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteImage {
    pub image_url_list: Option<Vec<String>>,
    pub image_id_list: Option<Vec<String>>,
}

/// Item weight in kilograms; sent as either a string or a number.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RemoteWeight {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteDimension {
    pub package_length: Option<i32>,
    pub package_width: Option<i32>,
    pub package_height: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteBrand {
    pub brand_id: Option<i64>,
    pub original_brand_name: Option<String>,
}

/// Body of the token refresh exchange.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
    pub shop_id: i64,
    pub partner_id: i64,
}

/// Response of the token refresh exchange (not enveloped).
#[derive(Debug, Default, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expire_in: Option<i64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_list_envelope_parses() {
        let body = json!({
            "error": "",
            "message": "",
            "request_id": "abc",
            "response": {
                "item": [
                    {"item_id": 1, "item_status": "NORMAL", "update_time": 1_700_000_000},
                    {"item_id": 2, "item_status": "UNLIST"}
                ],
                "total_count": 2,
                "has_next_page": false,
                "next_offset": 2
            }
        });
        let envelope: ApiEnvelope<ItemListPage> = serde_json::from_value(body).unwrap();
        assert!(envelope.error_code().is_none());
        let page = envelope.response.unwrap();
        assert_eq!(page.item_ids(), vec![ItemId::new(1), ItemId::new(2)]);
        assert!(!page.has_next_page);
        assert_eq!(page.next_offset, Some(2));
    }

    #[test]
    fn test_error_envelope() {
        let body = json!({
            "error": "error_auth",
            "message": "Invalid access_token."
        });
        let envelope: ApiEnvelope<ItemListPage> = serde_json::from_value(body).unwrap();
        assert_eq!(envelope.error_code(), Some("error_auth"));
        assert!(envelope.response.is_none());
    }

    #[test]
    fn test_detail_page_without_item_list() {
        let page: ItemDetailPage = serde_json::from_value(json!({})).unwrap();
        assert!(page.item_list.is_none());
    }

    #[test]
    fn test_weight_accepts_string_or_number() {
        let item: RemoteItem =
            serde_json::from_value(json!({"item_id": 1, "weight": "0.35"})).unwrap();
        assert!(matches!(item.weight, Some(RemoteWeight::Text(ref w)) if w == "0.35"));

        let item: RemoteItem =
            serde_json::from_value(json!({"item_id": 1, "weight": 1.2})).unwrap();
        assert!(matches!(item.weight, Some(RemoteWeight::Number(w)) if (w - 1.2).abs() < 1e-9));
    }

    #[test]
    fn test_null_arrays_parse_as_none() {
        let item: RemoteItem = serde_json::from_value(json!({
            "item_id": 1,
            "attribute_list": null,
            "logistic_info": null
        }))
        .unwrap();
        assert!(item.attribute_list.is_none());
        assert!(item.logistic_info.is_none());
    }
}
