// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Market-data provider payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Response envelope shared by every provider endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: Option<ApiStatus>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ApiStatus {
    /// Human-readable description for logs and errors.
    pub fn describe(status: Option<&ApiStatus>) -> String {
        match status {
            Some(ApiStatus {
                error_code,
                error_message,
            }) => format!(
                "error_code={} error_message={}",
                error_code.map_or_else(|| "-".to_string(), |c| c.to_string()),
                error_message.as_deref().unwrap_or("-")
            ),
            None => "no status".to_string(),
        }
    }
}

/// Platform (host chain) of a token contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TokenPlatform {
    pub id: u64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    pub token_address: String,
}

/// One entry of the provider's identifier map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IdentifierEntry {
    pub id: u64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<TokenPlatform>,
}

/// USD leg of a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsdQuote {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteCurrencies {
    #[serde(rename = "USD")]
    pub usd: UsdQuote,
}

/// Latest quote for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestQuote {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub slug: String,
    pub quote: QuoteCurrencies,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LatestQuote {
    pub fn usd_price(&self) -> Option<f64> {
        self.quote.usd.price.filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Historical quote series grouped by range label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedQuotes {
    #[serde(rename = "1d")]
    pub day: Value,
    #[serde(rename = "7d")]
    pub week: Value,
    #[serde(rename = "30d")]
    pub month: Value,
    #[serde(rename = "90d")]
    pub quarter: Value,
}

/// Parameters of one historical-quotes request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub id: u64,
    pub interval: &'static str,
    pub time_start: i64,
    pub time_end: i64,
    pub count: u32,
}

impl HistoricalQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.to_string()),
            ("interval", self.interval.to_string()),
            ("time_start", self.time_start.to_string()),
            ("time_end", self.time_end.to_string()),
            ("count", self.count.to_string()),
        ]
    }
}

/// First value of a provider `data` object keyed by id (or first array item).
pub fn first_data_value(data: &Value) -> Option<&Value> {
    match data {
        Value::Object(map) => map.values().next().and_then(|v| match v {
            Value::Array(items) => items.first(),
            other => Some(other),
        }),
        Value::Array(items) => items.first(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn latest_quote_keeps_unknown_fields() {
        let quote: LatestQuote = serde_json::from_value(json!({
            "id": 1027,
            "name": "Ethereum",
            "symbol": "ETH",
            "slug": "ethereum",
            "cmc_rank": 2,
            "quote": { "USD": { "price": 3120.5, "volume_24h": 1.0 } }
        }))
        .unwrap();

        assert_eq!(quote.usd_price(), Some(3120.5));
        assert_eq!(quote.extra["cmc_rank"], 2);
        assert_eq!(quote.quote.usd.extra["volume_24h"], 1.0);

        let round_trip = serde_json::to_value(&quote).unwrap();
        assert_eq!(round_trip["cmc_rank"], 2);
        assert_eq!(round_trip["quote"]["USD"]["price"], 3120.5);
    }

    #[test]
    fn missing_or_zero_price_is_unresolved() {
        let quote: LatestQuote = serde_json::from_value(json!({
            "id": 1,
            "quote": { "USD": { "price": null } }
        }))
        .unwrap();
        assert_eq!(quote.usd_price(), None);

        let quote: LatestQuote = serde_json::from_value(json!({
            "id": 1,
            "quote": { "USD": { "price": 0.0 } }
        }))
        .unwrap();
        assert_eq!(quote.usd_price(), None);
    }

    #[test]
    fn first_data_value_handles_object_and_array_shapes() {
        let keyed = json!({ "1027": { "id": 1027 } });
        assert_eq!(first_data_value(&keyed).unwrap()["id"], 1027);

        let keyed_array = json!({ "ETH": [{ "id": 1027 }, { "id": 99 }] });
        assert_eq!(first_data_value(&keyed_array).unwrap()["id"], 1027);

        assert!(first_data_value(&json!({})).is_none());
        assert!(first_data_value(&json!(null)).is_none());
    }

    #[test]
    fn envelope_without_data() {
        let env: ApiEnvelope<Value> = serde_json::from_value(json!({
            "status": { "error_code": 1001, "error_message": "This API Key is invalid." }
        }))
        .unwrap();
        assert!(env.data.is_none());
        assert!(ApiStatus::describe(env.status.as_ref()).contains("1001"));
    }
}
