use crate::domain::payment_entity::{Payment, PaymentStatus};
use crate::domain::ports::{PaymentRepository, TransactionStore};
use crate::domain::transaction::{NewTransaction, TransactionFilter, TransactionRecord};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory transaction log.
///
/// Uses `Arc<RwLock<Vec<TransactionRecord>>>` so clones share one log. The
/// uniqueness check and the push happen under the same write lock.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    records: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction log.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, tx: NewTransaction) -> Result<TransactionRecord> {
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.key() == (tx.order_reference.as_str(), tx.transaction_reference.as_str()))
        {
            return Err(GatewayError::DuplicateTransaction {
                order_reference: tx.order_reference,
                transaction_reference: tx.transaction_reference,
            });
        }
        let record = tx.into_record(records.len() as u64 + 1, Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    async fn find_by_transaction_reference(
        &self,
        transaction_reference: &str,
    ) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.transaction_reference == transaction_reference)
            .cloned())
    }

    async fn find_successful_by_order_reference(
        &self,
        order_reference: &str,
    ) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.order_reference == order_reference && r.is_successful())
            .cloned())
    }

    async fn latest_for_order(&self, order_reference: &str) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.order_reference == order_reference)
            .max_by(|a, b| {
                a.transaction_date
                    .cmp(&b.transaction_date)
                    .then(a.id.cmp(&b.id))
            })
            .cloned())
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<TransactionRecord> =
            records.iter().filter(|r| filter.matches(r)).cloned().collect();
        matching.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then(a.id.cmp(&b.id))
        });
        Ok(matching)
    }
}

/// An in-memory stand-in for the host application's payments table.
///
/// Transitions follow the same rules a real payment model applies: completion
/// records the external reference and merges the provider response.
#[derive(Default, Clone)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<Vec<Payment>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, payment: Payment) {
        self.payments.write().await.push(payment);
    }

    pub async fn get(&self, id: u64) -> Option<Payment> {
        self.payments
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Applies `apply` to the payment; the closure reports whether the
    /// payment ended up in the requested state.
    async fn transition<F>(&self, id: u64, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Payment) -> bool + Send,
    {
        let mut payments = self.payments.write().await;
        Ok(payments
            .iter_mut()
            .find(|p| p.id == id)
            .is_some_and(apply))
    }
}

fn merge_provider_response(existing: Option<Value>, update: Value) -> Value {
    match (existing, update) {
        (Some(Value::Object(mut base)), Value::Object(extra)) => {
            base.extend(extra);
            Value::Object(base)
        }
        (_, update) => update,
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn find_by_any_reference(&self, candidates: &[&str]) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .find(|p| candidates.iter().any(|c| !c.is_empty() && p.matches_reference(c)))
            .cloned())
    }

    async fn mark_completed(
        &self,
        payment: &Payment,
        external_reference: &str,
        provider_response: Value,
    ) -> Result<bool> {
        let external_reference = external_reference.to_string();
        self.transition(payment.id, move |p| match p.status {
            PaymentStatus::Completed => true,
            PaymentStatus::Failed | PaymentStatus::Cancelled => false,
            PaymentStatus::Pending | PaymentStatus::Processing => {
                p.status = PaymentStatus::Completed;
                p.reference_number = Some(external_reference);
                p.completed_at = Some(Utc::now());
                p.provider_response = Some(merge_provider_response(
                    p.provider_response.take(),
                    provider_response,
                ));
                true
            }
        })
        .await
    }

    async fn mark_failed(
        &self,
        payment: &Payment,
        reason: &str,
        provider_response: Value,
    ) -> Result<bool> {
        let mut response = provider_response;
        if let Value::Object(map) = &mut response {
            map.insert("failure_reason".to_string(), Value::String(reason.to_string()));
        }
        self.transition(payment.id, move |p| {
            if p.status.is_final() {
                return p.status == PaymentStatus::Failed;
            }
            p.status = PaymentStatus::Failed;
            p.provider_response = Some(merge_provider_response(p.provider_response.take(), response));
            true
        })
        .await
    }
}
