use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Normalized status of a callback the gateway reported as paid.
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// Maps a gateway status onto the stored order status.
///
/// `paid` (any case) becomes `SUCCESS`; anything else is stored uppercased.
pub fn normalize_status(raw: &str) -> String {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("paid") {
        STATUS_SUCCESS.to_string()
    } else {
        raw.to_uppercase()
    }
}

/// Transaction data derived from one callback delivery, ready to be stored.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NewTransaction {
    pub order_status: String,
    pub order_reference: String,
    pub transaction_reference: String,
    pub transaction_amount: String,
    pub transaction_currency: String,
    pub payment_channel: String,
    pub transaction_date: DateTime<Utc>,
}

impl NewTransaction {
    pub fn is_successful(&self) -> bool {
        self.order_status.eq_ignore_ascii_case(STATUS_SUCCESS)
    }

    /// Stamps the record with its identifier and creation time.
    pub fn into_record(self, id: u64, now: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            order_status: self.order_status,
            order_reference: self.order_reference,
            transaction_reference: self.transaction_reference,
            transaction_amount: self.transaction_amount,
            transaction_currency: self.transaction_currency,
            payment_channel: self.payment_channel,
            transaction_date: self.transaction_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A stored entry of the transaction log.
///
/// `(order_reference, transaction_reference)` is unique across the log.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    pub id: u64,
    pub order_status: String,
    pub order_reference: String,
    pub transaction_reference: String,
    pub transaction_amount: String,
    pub transaction_currency: String,
    pub payment_channel: String,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn is_successful(&self) -> bool {
        self.order_status.eq_ignore_ascii_case(STATUS_SUCCESS)
    }

    /// Amount with two decimals; `0.00` when empty or not a number.
    pub fn formatted_amount(&self) -> String {
        let amount = Decimal::from_str(self.transaction_amount.trim()).unwrap_or(Decimal::ZERO);
        format!("{:.2}", amount)
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.order_reference, &self.transaction_reference)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Any,
    Successful,
    Failed,
}

/// Selection criteria for listing the transaction log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub status: StatusFilter,
    pub order_reference: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        let status_ok = match self.status {
            StatusFilter::Any => true,
            StatusFilter::Successful => record.is_successful(),
            StatusFilter::Failed => !record.is_successful(),
        };
        status_ok
            && self
                .order_reference
                .as_ref()
                .is_none_or(|reference| reference == &record.order_reference)
            && self.from.is_none_or(|from| record.transaction_date >= from)
            && self.to.is_none_or(|to| record.transaction_date <= to)
    }
}
