//! Payload normalization: flatten nested batches and decode stringified items.
//!
//! Producers hand us bodies in several shapes: already-structured objects,
//! JSON encoded as a string, objects whose `body` field is a JSON string, and
//! arrays of any of these nested to arbitrary depth. [`normalize`] turns all
//! of them into one flat list of decoded values and never fails.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The payload sent to a worker instance for one slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPayload {
    #[serde(rename = "batchData")]
    pub batch_data: Vec<Value>,
}

impl NormalizedPayload {
    /// Encode as the JSON request body.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// A failure that normalization recovered from.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeIssue {
    /// One item could not be decoded and was kept as-is.
    ItemDecode {
        index: usize,
        item: Value,
        error: String,
    },
    /// The whole input was unusable and an empty payload was produced.
    MalformedBatch { error: String },
}

impl std::fmt::Display for NormalizeIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemDecode { index, error, .. } => {
                write!(f, "item {index} kept undecoded: {error}")
            }
            Self::MalformedBatch { error } => write!(f, "batch dropped: {error}"),
        }
    }
}

/// Result of [`normalize_reported`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalization {
    pub payload: NormalizedPayload,
    pub issues: Vec<NormalizeIssue>,
}

/// A raw batch entry: either a single value or a nested sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Leaf(Value),
    Nested(Vec<Item>),
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => Self::Nested(values.into_iter().map(Item::from).collect()),
            other => Self::Leaf(other),
        }
    }
}

impl Item {
    /// Flatten to leaves in depth-first order, at any nesting depth.
    pub fn flatten(self) -> Vec<Value> {
        let mut out = Vec::new();
        let mut stack = vec![vec![self].into_iter()];
        while let Some(top) = stack.last_mut() {
            match top.next() {
                Some(Item::Leaf(value)) => out.push(value),
                Some(Item::Nested(children)) => stack.push(children.into_iter()),
                None => {
                    stack.pop();
                }
            }
        }
        out
    }
}

/// Normalize `raw`, logging any recovered failure.
pub fn normalize(raw: &Value) -> NormalizedPayload {
    let Normalization { payload, issues } = normalize_reported(raw);
    for issue in &issues {
        match issue {
            NormalizeIssue::ItemDecode { item, .. } => {
                tracing::warn!(%issue, %item, "failed to parse item");
            }
            NormalizeIssue::MalformedBatch { .. } => {
                tracing::warn!(%issue, raw = %raw, "failed to normalize batch data");
            }
        }
    }
    payload
}

/// Normalize `raw` and return every recovered failure alongside the payload.
pub fn normalize_reported(raw: &Value) -> Normalization {
    let root = match batch_data(raw) {
        Ok(root) => root,
        Err(error) => {
            return Normalization {
                payload: NormalizedPayload::default(),
                issues: vec![NormalizeIssue::MalformedBatch { error }],
            }
        }
    };

    let mut issues = Vec::new();
    let batch_data = root
        .flatten()
        .into_iter()
        .enumerate()
        .map(|(index, item)| match decode_item(&item) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => item,
            Err(error) => {
                issues.push(NormalizeIssue::ItemDecode {
                    index,
                    item: item.clone(),
                    error,
                });
                item
            }
        })
        .collect();

    Normalization {
        payload: NormalizedPayload { batch_data },
        issues,
    }
}

fn batch_data(raw: &Value) -> Result<Item, String> {
    match raw.get("batchData") {
        None | Some(Value::Null) => Ok(Item::Nested(Vec::new())),
        Some(array @ Value::Array(_)) => Ok(Item::from(array.clone())),
        Some(other) => Err(format!("batchData must be an array, found {}", kind(other))),
    }
}

/// `Ok(None)` means the item is passed through untouched.
fn decode_item(item: &Value) -> Result<Option<Value>, String> {
    let encoded = match item {
        Value::String(s) => s,
        Value::Object(map) => match map.get("body") {
            Some(Value::String(body)) if !body.is_empty() => body,
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    serde_json::from_str(encoded)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
