// Snapshot wire format.
//
// Registry blob: JSON object mapping topic name -> per-topic blob (a string).
// Per-topic blob: JSON array of {"id", "data"} in delivery order.
use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Serialize)]
struct RecordRef<'a> {
    id: &'a str,
    data: &'a str,
}

// Older writers omitted empty fields.
#[derive(Deserialize)]
struct Record {
    #[serde(default)]
    id: String,
    #[serde(default)]
    data: String,
}

pub(crate) fn encode_items<'a, I>(items: I) -> serde_json::Result<String>
where
    I: IntoIterator<Item = &'a Item>,
{
    let records: Vec<RecordRef<'_>> = items
        .into_iter()
        .map(|item| RecordRef {
            id: item.id(),
            data: item.data(),
        })
        .collect();
    serde_json::to_string(&records)
}

pub(crate) fn decode_items(bytes: &[u8]) -> serde_json::Result<VecDeque<Item>> {
    let records: Option<Vec<Record>> = serde_json::from_slice(bytes)?;
    Ok(records
        .unwrap_or_default()
        .into_iter()
        .map(|record| Item::new(record.id, record.data))
        .collect())
}

pub(crate) fn encode_registry(topics: &BTreeMap<String, String>) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(topics)
}

pub(crate) fn decode_registry(bytes: &[u8]) -> serde_json::Result<HashMap<String, String>> {
    serde_json::from_slice(bytes)
}
