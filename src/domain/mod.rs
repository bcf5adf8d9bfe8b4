//! Domain layer: gateway types and the ports the services depend on.

pub mod callback;
pub mod config;
pub mod payment;
pub mod payment_entity;
pub mod ports;
pub mod transaction;

use serde::{Deserialize, Deserializer};

/// Accepts a JSON string or number and keeps its textual form.
///
/// Form posts deliver amounts as strings while JSON clients send numbers; both
/// have to survive unchanged because the amount text is part of the signature.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
