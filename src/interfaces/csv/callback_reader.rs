use crate::domain::callback::CallbackPayload;
use crate::error::{GatewayError, Result};
use serde::Deserialize;
use std::io::Read;

/// One CSV row, read as text so amounts keep the scale they were sent with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackRow {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    order_reference: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    extra_data: Option<String>,
}

impl From<CallbackRow> for CallbackPayload {
    fn from(row: CallbackRow) -> Self {
        Self {
            status: row.status,
            order_reference: row.order_reference,
            transaction_id: row.transaction_id,
            amount: row.amount,
            date: row.date,
            desc: row.desc,
            hash: row.hash,
            extra_data: row.extra_data,
        }
    }
}

/// Reads recorded callback deliveries from a CSV source, for replaying
/// callbacks the application missed.
///
/// Columns use the gateway's parameter names (`status`, `orderReference`,
/// `transactionId`, `amount`, `date`, `desc`, `hash`, `extraData`). Whitespace
/// is trimmed and short rows are accepted; absent columns read as missing.
pub struct CallbackReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CallbackReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one payload per row; a malformed row is an error for that row only.
    pub fn callbacks(self) -> impl Iterator<Item = Result<CallbackPayload>> {
        self.reader
            .into_deserialize::<CallbackRow>()
            .map(|result| result.map(CallbackPayload::from).map_err(GatewayError::from))
    }
}
