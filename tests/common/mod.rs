#![allow(dead_code)]

use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const CALLBACK_HEADER: [&str; 6] = [
    "status",
    "orderReference",
    "transactionId",
    "amount",
    "date",
    "desc",
];

/// Writes `rows` paid callbacks, each for its own order.
pub fn generate_callbacks_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = rand::thread_rng();
    let channels = ["CARD", "EQUITEL", "MPESA", "AIRTEL"];

    wtr.write_record(CALLBACK_HEADER)?;
    for i in 1..=rows {
        let amount = format!("{}.{:02}", rng.gen_range(1..10_000), rng.gen_range(0..100));
        wtr.write_record([
            "paid",
            &format!("ORD{:07}", i),
            &format!("TXN{:07}", i),
            &amount,
            "2024-05-01T10:00:00.000+0300",
            channels[rng.gen_range(0..channels.len())],
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
