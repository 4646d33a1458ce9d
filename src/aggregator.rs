use crate::error::Result;
use crate::schema::{AggregatedRecord, Month, Row};
use crate::store::{original_key, sales_key, KeyValueStore};
use log::debug;

/// Loads the normalized rows stored for one month, if any.
pub fn load_month<S: KeyValueStore + ?Sized>(store: &S, month: Month) -> Result<Option<Vec<Row>>> {
    match store.get(&sales_key(month))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Loads the rows of one month exactly as they were read from the sheet.
pub fn load_original<S: KeyValueStore + ?Sized>(
    store: &S,
    month: Month,
) -> Result<Option<Vec<Row>>> {
    match store.get(&original_key(month))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Months that currently hold a dataset, in calendar order.
pub fn loaded_months<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<Month>> {
    let mut months = Vec::new();
    for month in Month::all() {
        if store.contains(&sales_key(month))? {
            months.push(month);
        }
    }
    Ok(months)
}

/// Concatenates every stored month into one year-long sequence.
///
/// Ordering is month-ascending, then the original row order within each month.
/// Months without data are skipped.
pub fn aggregate_all<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<AggregatedRecord>> {
    let mut records = Vec::new();

    for month in Month::all() {
        if let Some(rows) = load_month(store, month)? {
            debug!("Aggregating {} rows from {}", rows.len(), month);
            records.extend(rows.iter().map(|row| AggregatedRecord::new(row, month)));
        }
    }

    Ok(records)
}
