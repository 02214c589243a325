//! Key-value store seam.
//!
//! Every collection talks to its table through [`KeyValueStore`]: one point
//! read, one unconditional write, and a paginated scan. Durability, query
//! execution and concurrency control belong to the store; this crate only
//! shapes requests and reads results.

mod dynamo;
mod memory;

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::number::normalize;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// One stored record, or the key portion of one.
pub type Item = BTreeMap<String, AttrValue>;

// ── AttrValue ────────────────────────────────────────────────────────────────

/// A typed attribute value as the store holds it.
///
/// Numbers are arbitrary-precision decimals. They serialize through
/// [`normalize`], so an `AttrValue` written to JSON never carries a decimal.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    S(String),
    N(BigDecimal),
    L(Vec<AttrValue>),
    M(Item),
}

impl AttrValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// The store's one-letter type tag, as used in its diagnostics.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Null    => "NULL",
            Self::Bool(_) => "BOOL",
            Self::S(_)    => "S",
            Self::N(_)    => "N",
            Self::L(_)    => "L",
            Self::M(_)    => "M",
        }
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null    => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::S(s)    => serializer.serialize_str(s),
            Self::N(n)    => normalize(n).serialize(serializer),
            Self::L(list) => list.serialize(serializer),
            Self::M(map)  => map.serialize(serializer),
        }
    }
}

/// Raised when a JSON number has no decimal representation.
#[derive(Debug, Error)]
#[error("unsupported number `{0}`")]
pub struct UnsupportedNumber(pub String);

impl TryFrom<&serde_json::Value> for AttrValue {
    type Error = UnsupportedNumber;

    /// JSON numbers go through their source text (serde_json's
    /// `arbitrary_precision`), so no precision is lost on the way into the
    /// store.
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        Ok(match value {
            Value::Null      => Self::Null,
            Value::Bool(b)   => Self::Bool(*b),
            Value::String(s) => Self::S(s.clone()),
            Value::Number(n) => {
                let text = n.to_string();
                Self::N(BigDecimal::from_str(&text).map_err(|_| UnsupportedNumber(text))?)
            }
            Value::Array(list) => Self::L(
                list.iter().map(Self::try_from).collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Self::M(item_from_json(map)?),
        })
    }
}

/// Converts a JSON object into a storable item.
pub fn item_from_json(
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<Item, UnsupportedNumber> {
    map.iter()
        .map(|(k, v)| AttrValue::try_from(v).map(|v| (k.clone(), v)))
        .collect()
}

// ── Key schema ───────────────────────────────────────────────────────────────

/// Primary-key attributes of a table: a partition key and an optional sort key.
///
/// Key attributes are always strings in this system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySchema {
    pub partition: &'static str,
    pub sort: Option<&'static str>,
}

impl KeySchema {
    pub const fn partition(name: &'static str) -> Self {
        Self { partition: name, sort: None }
    }

    pub const fn composite(partition: &'static str, sort: &'static str) -> Self {
        Self { partition, sort: Some(sort) }
    }

    /// Key attribute names in declaration order.
    pub fn attributes(self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.partition).chain(self.sort)
    }
}

// ── Store trait ──────────────────────────────────────────────────────────────

/// One page of a table scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Present when the store has more records to return. Pass it back as
    /// the exclusive start key of the next scan.
    pub last_evaluated_key: Option<Item>,
}

/// A failure reported by the store, carrying its diagnostic message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("throttled: {0}")]
    Throttled(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("store service error: {0}")]
    Service(String),
}

impl StoreError {
    /// The store's own diagnostic text, without our prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Throttled(m)
            | Self::AccessDenied(m)
            | Self::Validation(m)
            | Self::ResourceNotFound(m)
            | Self::Service(m) => m,
        }
    }
}

/// The three store calls the data-access layer needs.
///
/// Implementations must be shareable across concurrent invocations; any
/// consistency beyond last-writer-wins is the store's business.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Equality-keyed point read. `Ok(None)` when no record has that key.
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError>;

    /// Inserts `item`, or fully replaces the record with the same key.
    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError>;

    /// Returns one page of the table, starting after `exclusive_start_key`.
    async fn scan(
        &self,
        table: &str,
        exclusive_start_key: Option<Item>,
    ) -> Result<ScanPage, StoreError>;
}
