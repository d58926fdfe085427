//! Conversion from the instrument's CSV export to Monsoon text format.
//!
//! Input: a header row, then `timestamp_ns,current_mA[,...]` rows.
//! Output: one `<seconds> <amps>` line per sample, seconds with 7 decimal
//! places and amps with 12.

use crate::error::{BitsError, Result};
use std::io::{Read, Write};

const NANOS_PER_SEC: f64 = 1e9;
const MILLIAMPS_PER_AMP: f64 = 1e3;

/// Rewrite every CSV sample as a Monsoon line. Returns the sample count.
pub fn convert_csv_to_monsoon<R: Read, W: Write>(input: R, mut output: W) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut samples = 0;
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() < 2 {
            return Err(BitsError::csv(
                line,
                format!("expected timestamp and current columns, found {}", record.len()),
            ));
        }
        let timestamp_ns = parse_column(&record, 0, line)?;
        let current_ma = parse_column(&record, 1, line)?;
        writeln!(
            output,
            "{:.7} {:.12}",
            timestamp_ns / NANOS_PER_SEC,
            current_ma / MILLIAMPS_PER_AMP
        )?;
        samples += 1;
    }
    output.flush()?;
    Ok(samples)
}

fn parse_column(record: &csv::StringRecord, index: usize, line: u64) -> Result<f64> {
    let raw = &record[index];
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| BitsError::csv(line, format!("column {index} value '{raw}' is not a number")))
}
