// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared serialization helpers.
//!
//! Upstream APIs and clients send amounts either as JSON numbers or as
//! numeric strings (`"0.0021"`). These helpers accept both.

use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn parse_amount<E: de::Error>(raw: NumberOrString) -> Result<f64, E> {
    match raw {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| E::custom(format!("invalid numeric string: {s:?}"))),
    }
}

/// Deserialize an `f64` from a JSON number or a numeric string.
pub fn f64_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    parse_amount(NumberOrString::deserialize(deserializer)?)
}

/// Deserialize an optional `f64` from a JSON number, numeric string or null.
pub fn opt_f64_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(raw) => parse_amount(raw).map(Some),
        None => Ok(None),
    }
}

/// Serialize an `f64` as a decimal string (the custody API's amount format).
pub fn f64_as_string<S>(value: &f64, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Amounts {
        #[serde(deserialize_with = "f64_from_number_or_string")]
        amount: f64,
        #[serde(default, deserialize_with = "opt_f64_from_number_or_string")]
        fee: Option<f64>,
    }

    #[test]
    fn accepts_numbers_and_strings() {
        let a: Amounts = serde_json::from_str(r#"{"amount": 1.5, "fee": "0.25"}"#).unwrap();
        assert_eq!(a.amount, 1.5);
        assert_eq!(a.fee, Some(0.25));

        let b: Amounts = serde_json::from_str(r#"{"amount": " 100 "}"#).unwrap();
        assert_eq!(b.amount, 100.0);
        assert_eq!(b.fee, None);
    }

    #[test]
    fn rejects_non_numeric_strings() {
        let result = serde_json::from_str::<Amounts>(r#"{"amount": "ten"}"#);
        assert!(result.is_err());
    }
}
