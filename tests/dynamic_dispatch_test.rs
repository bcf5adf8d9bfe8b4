use chrono::Utc;
use jenga_pgw::domain::payment_entity::{Payment, PaymentStatus};
use jenga_pgw::domain::ports::{PaymentRepositoryBox, TransactionStoreBox};
use jenga_pgw::domain::transaction::NewTransaction;
use jenga_pgw::infrastructure::in_memory::{InMemoryPaymentRepository, InMemoryTransactionStore};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let transaction_store: TransactionStoreBox = Box::new(InMemoryTransactionStore::new());
    let repository = InMemoryPaymentRepository::new();
    repository
        .add(Payment {
            id: 1,
            transaction_id: "ORD12345AB".to_string(),
            reference_number: None,
            status: PaymentStatus::Pending,
            amount: dec!(250.00),
            completed_at: None,
            provider_response: None,
        })
        .await;
    let payment_repository: PaymentRepositoryBox = Box::new(repository);

    let tx = NewTransaction {
        order_status: "SUCCESS".to_string(),
        order_reference: "ORD12345AB".to_string(),
        transaction_reference: "TXN001".to_string(),
        transaction_amount: "250.00".to_string(),
        transaction_currency: "KES".to_string(),
        payment_channel: "CARD".to_string(),
        transaction_date: Utc::now(),
    };

    // Verify Send + Sync by spawning tasks
    let ts_handle = tokio::spawn(async move {
        transaction_store.insert(tx).await.unwrap();
        transaction_store
            .find_by_transaction_reference("TXN001")
            .await
            .unwrap()
            .unwrap()
    });

    let pr_handle = tokio::spawn(async move {
        let payment = payment_repository
            .find_by_any_reference(&["ORD12345AB"])
            .await
            .unwrap()
            .unwrap();
        payment_repository
            .mark_completed(&payment, "TXN001", json!({}))
            .await
            .unwrap()
    });

    let retrieved_tx = ts_handle.await.unwrap();
    assert_eq!(retrieved_tx.order_reference, "ORD12345AB");
    assert!(pr_handle.await.unwrap());
}
