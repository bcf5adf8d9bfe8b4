use chrono::Utc;
use jenga_pgw::domain::ports::{TransactionStoreBox, TransactionStoreFactory};
use jenga_pgw::domain::transaction::NewTransaction;
use jenga_pgw::infrastructure::in_memory::InMemoryTransactionStore;

fn new_tx(reference: &str) -> NewTransaction {
    NewTransaction {
        order_status: "SUCCESS".to_string(),
        order_reference: "ORD12345AB".to_string(),
        transaction_reference: reference.to_string(),
        transaction_amount: "10.00".to_string(),
        transaction_currency: String::new(),
        payment_channel: "EQUITEL".to_string(),
        transaction_date: Utc::now(),
    }
}

#[tokio::test]
async fn test_factory_instantiation() {
    let factory: TransactionStoreFactory =
        Box::new(|| Box::new(InMemoryTransactionStore::new()) as TransactionStoreBox);

    let store = factory();
    store.insert(new_tx("TXN001")).await.unwrap();
    let retrieved = store.latest_for_order("ORD12345AB").await.unwrap().unwrap();
    assert_eq!(retrieved.transaction_reference, "TXN001");

    // Each call yields an independent log.
    let fresh = factory();
    assert!(fresh.latest_for_order("ORD12345AB").await.unwrap().is_none());
}

#[tokio::test]
async fn test_factory_in_task() {
    let factory: TransactionStoreFactory =
        Box::new(|| Box::new(InMemoryTransactionStore::new()) as TransactionStoreBox);

    let handle = tokio::spawn(async move {
        let store = factory();
        store.insert(new_tx("TXN002")).await.unwrap();
        store.find_by_transaction_reference("TXN002").await.unwrap().unwrap()
    });

    let retrieved = handle.await.unwrap();
    assert_eq!(retrieved.payment_channel, "EQUITEL");
}
