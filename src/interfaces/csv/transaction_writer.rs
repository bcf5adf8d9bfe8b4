use crate::domain::transaction::TransactionRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct TransactionRow<'a> {
    id: u64,
    order_status: &'a str,
    order_reference: &'a str,
    transaction_reference: &'a str,
    transaction_amount: String,
    transaction_currency: &'a str,
    payment_channel: &'a str,
    transaction_date: String,
}

impl<'a> From<&'a TransactionRecord> for TransactionRow<'a> {
    fn from(record: &'a TransactionRecord) -> Self {
        Self {
            id: record.id,
            order_status: &record.order_status,
            order_reference: &record.order_reference,
            transaction_reference: &record.transaction_reference,
            transaction_amount: record.formatted_amount(),
            transaction_currency: &record.transaction_currency,
            payment_channel: &record.payment_channel,
            transaction_date: record.transaction_date.to_rfc3339(),
        }
    }
}

/// Writes the transaction log as CSV, amounts with two decimals.
pub struct TransactionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a TransactionRecord>,
    {
        for record in records {
            self.writer.serialize(TransactionRow::from(record))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
