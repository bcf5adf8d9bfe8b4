use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{NewTransaction, TransactionFilter, TransactionRecord};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family holding transaction records, keyed by `order_reference \0 transaction_reference`.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family indexing primary keys by transaction reference.
pub const CF_TRANSACTION_REFS: &str = "transaction_refs";
/// Column Family for bookkeeping (the record id sequence).
pub const CF_META: &str = "meta";

const NEXT_ID_KEY: &[u8] = b"next_id";
const KEY_SEPARATOR: u8 = 0;

/// A persistent transaction log backed by RocksDB.
///
/// The primary key is the `(order_reference, transaction_reference)` pair, so
/// the uniqueness constraint is the key space itself. Writers are serialized
/// by a mutex, making the existence check and the batch write atomic for all
/// clones of the store.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_TRANSACTIONS, CF_TRANSACTION_REFS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| GatewayError::StorageError(format!("{} column family not found", name)))
    }

    fn next_id(&self) -> Result<u64> {
        let meta = self.cf(CF_META)?;
        let current = match self.db.get_cf(meta, NEXT_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    GatewayError::StorageError("Corrupt id sequence".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 1,
        };
        Ok(current)
    }

    /// Records whose primary key starts with `prefix`.
    fn scan(&self, prefix: &[u8]) -> Result<Vec<TransactionRecord>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mode = if prefix.is_empty() {
            IteratorMode::Start
        } else {
            IteratorMode::From(prefix, Direction::Forward)
        };

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push(decode(&value)?);
        }
        Ok(records)
    }
}

fn primary_key(order_reference: &str, transaction_reference: &str) -> Vec<u8> {
    let mut key = order_prefix(order_reference);
    key.extend_from_slice(transaction_reference.as_bytes());
    key
}

fn order_prefix(order_reference: &str) -> Vec<u8> {
    let mut key = order_reference.as_bytes().to_vec();
    key.push(KEY_SEPARATOR);
    key
}

fn reference_key(transaction_reference: &str, order_reference: &str) -> Vec<u8> {
    let mut key = transaction_reference.as_bytes().to_vec();
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(order_reference.as_bytes());
    key
}

fn decode(bytes: &[u8]) -> Result<TransactionRecord> {
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::StorageError(format!("Failed to deserialize transaction: {}", e)))
}

fn by_transaction_date(a: &TransactionRecord, b: &TransactionRecord) -> std::cmp::Ordering {
    a.transaction_date
        .cmp(&b.transaction_date)
        .then(a.id.cmp(&b.id))
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn insert(&self, tx: NewTransaction) -> Result<TransactionRecord> {
        let _guard = self.write_lock.lock().await;

        let transactions = self.cf(CF_TRANSACTIONS)?;
        let key = primary_key(&tx.order_reference, &tx.transaction_reference);
        if self.db.get_pinned_cf(transactions, &key)?.is_some() {
            return Err(GatewayError::DuplicateTransaction {
                order_reference: tx.order_reference,
                transaction_reference: tx.transaction_reference,
            });
        }

        let id = self.next_id()?;
        let record = tx.into_record(id, Utc::now());
        let value = serde_json::to_vec(&record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(transactions, &key, value);
        if !record.transaction_reference.is_empty() {
            batch.put_cf(
                self.cf(CF_TRANSACTION_REFS)?,
                reference_key(&record.transaction_reference, &record.order_reference),
                &key,
            );
        }
        batch.put_cf(self.cf(CF_META)?, NEXT_ID_KEY, (id + 1).to_be_bytes());
        self.db.write(batch)?;

        Ok(record)
    }

    async fn find_by_transaction_reference(
        &self,
        transaction_reference: &str,
    ) -> Result<Option<TransactionRecord>> {
        if transaction_reference.is_empty() {
            return Ok(None);
        }
        let refs = self.cf(CF_TRANSACTION_REFS)?;
        let mut prefix = transaction_reference.as_bytes().to_vec();
        prefix.push(KEY_SEPARATOR);

        let primary = match self
            .db
            .iterator_cf(refs, IteratorMode::From(&prefix, Direction::Forward))
            .next()
        {
            Some(item) => {
                let (key, value) = item?;
                if !key.starts_with(&prefix) {
                    return Ok(None);
                }
                value
            }
            None => return Ok(None),
        };

        match self.db.get_cf(self.cf(CF_TRANSACTIONS)?, primary)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_successful_by_order_reference(
        &self,
        order_reference: &str,
    ) -> Result<Option<TransactionRecord>> {
        Ok(self
            .scan(&order_prefix(order_reference))?
            .into_iter()
            .find(TransactionRecord::is_successful))
    }

    async fn latest_for_order(&self, order_reference: &str) -> Result<Option<TransactionRecord>> {
        Ok(self
            .scan(&order_prefix(order_reference))?
            .into_iter()
            .max_by(by_transaction_date))
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let prefix = filter
            .order_reference
            .as_deref()
            .map(order_prefix)
            .unwrap_or_default();
        let mut records: Vec<TransactionRecord> = self
            .scan(&prefix)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(by_transaction_date);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn new_tx(order: &str, reference: &str, status: &str, day: u32) -> NewTransaction {
        NewTransaction {
            order_status: status.to_string(),
            order_reference: order.to_string(),
            transaction_reference: reference.to_string(),
            transaction_amount: "1000.00".to_string(),
            transaction_currency: String::new(),
            payment_channel: "MPESA".to_string(),
            transaction_date: Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_TRANSACTIONS).is_some());
        assert!(store.db.cf_handle(CF_TRANSACTION_REFS).is_some());
        assert!(store.db.cf_handle(CF_META).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_insert_and_lookup() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let first = store
            .insert(new_tx("ORD12345AB", "TXN001", "SUCCESS", 1))
            .await
            .unwrap();
        let second = store
            .insert(new_tx("ORD12345AB", "TXN002", "FAILED", 2))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let found = store
            .find_by_transaction_reference("TXN002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, second);

        let success = store
            .find_successful_by_order_reference("ORD12345AB")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(success.transaction_reference, "TXN001");

        let latest = store.latest_for_order("ORD12345AB").await.unwrap().unwrap();
        assert_eq!(latest.transaction_reference, "TXN002");
    }

    #[tokio::test]
    async fn test_rocksdb_rejects_duplicate_pair() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        store
            .insert(new_tx("ORD12345AB", "TXN001", "SUCCESS", 1))
            .await
            .unwrap();
        let result = store
            .insert(new_tx("ORD12345AB", "TXN001", "SUCCESS", 1))
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::DuplicateTransaction { .. })
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_order_prefix_does_not_leak() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        store
            .insert(new_tx("ORD12345ABC", "TXN001", "SUCCESS", 1))
            .await
            .unwrap();

        assert!(
            store
                .latest_for_order("ORD12345AB")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            store
                .insert(new_tx("ORD12345AB", "TXN001", "SUCCESS", 1))
                .await
                .unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        let next = store
            .insert(new_tx("ORD12345AB", "TXN002", "FAILED", 2))
            .await
            .unwrap();
        assert_eq!(next.id, 2);
        assert_eq!(
            store.list(&TransactionFilter::default()).await.unwrap().len(),
            2
        );
    }
}
