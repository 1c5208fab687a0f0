//! Delimited text encoding of the activity ledger.
//!
//! Fields containing the delimiter, a quote or a newline are quoted with
//! embedded quotes doubled. Decoding is lenient: a row that cannot be turned
//! into a [`StakeEvent`] is skipped instead of failing the whole load.

use {
    csv::{ReaderBuilder, StringRecord, WriterBuilder},
    stakeflow_common::{
        utils::time::{format_timestamp, parse_timestamp},
        Error, Result, StakeEvent, PLACEHOLDER_SYMBOL,
    },
    tracing::warn,
};

pub const HEADER: [&str; 9] = [
    "Date",
    "Company Name",
    "Pool Name",
    "Amount",
    "Token",
    "APY",
    "User Address",
    "Transaction Hash",
    "Category",
];

/// Rows written before the category column existed carry six to eight fields.
const MIN_FIELDS: usize = 6;

pub fn header_line() -> Result<String> {
    write_rows(std::iter::once(HEADER.map(String::from)))
}

/// Encode a single event as one terminated row.
pub fn encode_event(event: &StakeEvent) -> Result<String> {
    write_rows(std::iter::once(event_fields(event)))
}

/// Encode a full ledger, header first.
pub fn encode_ledger<'a, I>(events: I) -> Result<String>
where
    I: IntoIterator<Item = &'a StakeEvent>,
{
    let header = std::iter::once(HEADER.map(String::from));
    write_rows(header.chain(events.into_iter().map(event_fields)))
}

/// Decode persisted text into events in storage order.
pub fn decode_ledger(text: &str) -> Vec<StakeEvent> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut events = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => match record_to_event(&record) {
                Some(event) => events.push(event),
                None => warn!("Skipping malformed ledger row {}", index + 1),
            },
            Err(e) => warn!("Skipping unreadable ledger row {}: {}", index + 1, e),
        }
    }
    events
}

fn event_fields(event: &StakeEvent) -> [String; 9] {
    [
        format_timestamp(&event.timestamp),
        event.subject_name.clone(),
        event.pool_name.clone(),
        event.amount.to_string(),
        event.token_symbol.clone(),
        event.apy.clone(),
        event.user_address.clone().unwrap_or_default(),
        event.transaction_hash.clone().unwrap_or_default(),
        event.category.clone().unwrap_or_default(),
    ]
}

fn write_rows<I>(rows: I) -> Result<String>
where
    I: IntoIterator<Item = [String; 9]>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| Error::Serialization(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

fn record_to_event(record: &StringRecord) -> Option<StakeEvent> {
    if record.len() < MIN_FIELDS {
        return None;
    }
    let optional = |index: usize| {
        record
            .get(index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    };

    let timestamp = parse_timestamp(record.get(0)?)?;
    let subject_name = optional(1)?;
    let amount: f64 = record.get(3)?.trim().parse().ok()?;
    if !amount.is_finite() {
        return None;
    }

    Some(StakeEvent {
        timestamp,
        subject_name,
        pool_name: record.get(2)?.to_string(),
        amount,
        token_symbol: optional(4).unwrap_or_else(|| PLACEHOLDER_SYMBOL.to_string()),
        apy: record.get(5)?.to_string(),
        user_address: optional(6),
        transaction_hash: optional(7),
        category: optional(8),
    })
}
