use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Completed, failed and cancelled payments are never transitioned again.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }
}

/// The host application's payment, as far as reconciliation needs to see it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: u64,
    /// Primary identifier; usually the order reference sent to the gateway.
    pub transaction_id: String,
    /// Secondary identifier; the gateway's transaction id once known.
    pub reference_number: Option<String>,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub completed_at: Option<DateTime<Utc>>,
    pub provider_response: Option<serde_json::Value>,
}

impl Payment {
    pub fn matches_reference(&self, candidate: &str) -> bool {
        self.transaction_id == candidate || self.reference_number.as_deref() == Some(candidate)
    }

    pub fn summary(&self) -> PaymentSummary {
        PaymentSummary {
            id: self.id,
            status: self.status,
            amount: self.amount,
            completed_at: self.completed_at,
        }
    }
}

/// Payment details attached to a transaction status view.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentSummary {
    pub id: u64,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub completed_at: Option<DateTime<Utc>>,
}
