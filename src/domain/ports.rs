use super::payment_entity::Payment;
use super::transaction::{NewTransaction, TransactionFilter, TransactionRecord};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The transaction log.
///
/// Implementations must reject a second record with the same
/// `(order_reference, transaction_reference)` pair with
/// `GatewayError::DuplicateTransaction`. Callers check for duplicates before
/// inserting, but that read is not atomic with the write; the constraint is.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: NewTransaction) -> Result<TransactionRecord>;
    async fn find_by_transaction_reference(
        &self,
        transaction_reference: &str,
    ) -> Result<Option<TransactionRecord>>;
    async fn find_successful_by_order_reference(
        &self,
        order_reference: &str,
    ) -> Result<Option<TransactionRecord>>;
    /// Most recent record for the order, by transaction date.
    async fn latest_for_order(&self, order_reference: &str) -> Result<Option<TransactionRecord>>;
    /// Matching records ordered by transaction date, oldest first.
    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>>;
}

/// Payments owned by the host application.
///
/// Transitions must be idempotent: the gateway delivers callbacks at least
/// once, and duplicates re-request the same transition.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// First payment whose transaction id or reference number equals any candidate.
    async fn find_by_any_reference(&self, candidates: &[&str]) -> Result<Option<Payment>>;

    fn is_in_final_state(&self, payment: &Payment) -> bool {
        payment.status.is_final()
    }

    async fn mark_completed(
        &self,
        payment: &Payment,
        external_reference: &str,
        provider_response: Value,
    ) -> Result<bool>;

    async fn mark_failed(
        &self,
        payment: &Payment,
        reason: &str,
        provider_response: Value,
    ) -> Result<bool>;
}

pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type PaymentRepositoryBox = Box<dyn PaymentRepository>;
pub type TransactionStoreFactory = Box<dyn Fn() -> TransactionStoreBox + Send + Sync>;
