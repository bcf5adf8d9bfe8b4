use super::string_or_number;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payment notification delivered by the gateway.
///
/// The gateway calls back with either query parameters or a form body, so no
/// field is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub order_reference: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Payment channel: CARD, EQUITEL, MPESA, AIRTEL.
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub extra_data: Option<String>,
}

impl CallbackPayload {
    pub fn status(&self) -> &str {
        non_empty(&self.status).unwrap_or_default()
    }

    pub fn order_reference(&self) -> &str {
        non_empty(&self.order_reference).unwrap_or_default()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        non_empty(&self.transaction_id)
    }

    pub fn payment_channel(&self) -> Option<&str> {
        non_empty(&self.desc)
    }

    pub fn hash(&self) -> Option<&str> {
        non_empty(&self.hash)
    }

    /// Whether the fields needed to reconcile the delivery are present.
    pub fn has_required_fields(&self) -> bool {
        !self.status().is_empty() && !self.order_reference().is_empty()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a gateway timestamp such as `2024-05-01T10:00:00.000+0300`.
///
/// Offsets may be written with or without a colon; timestamps without an
/// offset are read as UTC. Returns `None` when nothing matches.
pub fn parse_transaction_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|naive| naive.and_utc())
        })
}
