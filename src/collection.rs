//! Collection accessors.
//!
//! One generic accessor serves every collection. What differs between them
//! (table, key schema, scan label, route path) lives in [`CollectionId`] and
//! [`Catalog`], not in per-collection code.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::store::{
    AttrValue, Item, KeySchema, KeyValueStore, MemoryStore, ScanPage, item_from_json,
};

/// The collections this system serves.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CollectionId {
    LeaderInfo,
    SatsangCount,
    UpcomingEvents,
    Kids,
}

impl CollectionId {
    pub const ALL: [Self; 4] = [Self::LeaderInfo, Self::SatsangCount, Self::UpcomingEvents, Self::Kids];

    /// Route path for both the read and the write.
    pub fn path(self) -> &'static str {
        match self {
            Self::LeaderInfo     => "/leaderInfo",
            Self::SatsangCount   => "/satsangCount",
            Self::UpcomingEvents => "/upcomingEvents",
            Self::Kids           => "/kids",
        }
    }

    /// Key of the record list in a scan-all response body.
    pub fn label(self) -> &'static str {
        match self {
            Self::LeaderInfo     => "leaderInfo",
            Self::SatsangCount   => "satsang_count",
            Self::UpcomingEvents => "upcomingEvents",
            Self::Kids           => "kids",
        }
    }

    /// Primary key of the backing table. Key attributes double as the query
    /// parameters of a point lookup. Kids are never looked up, but a roster
    /// entry is still identified by its `name`.
    pub fn key_schema(self) -> KeySchema {
        match self {
            Self::LeaderInfo     => KeySchema::partition("mandirName"),
            Self::SatsangCount   => KeySchema::composite("mandirName", "date"),
            Self::UpcomingEvents => KeySchema::partition("mandirName"),
            Self::Kids           => KeySchema::partition("name"),
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

/// Table names for every collection, fixed at start-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    pub leader_info: String,
    pub satsang_count: String,
    pub upcoming_events: String,
    pub kids: String,
}

impl Catalog {
    pub fn table(&self, id: CollectionId) -> &str {
        match id {
            CollectionId::LeaderInfo     => &self.leader_info,
            CollectionId::SatsangCount   => &self.satsang_count,
            CollectionId::UpcomingEvents => &self.upcoming_events,
            CollectionId::Kids           => &self.kids,
        }
    }

    /// An empty in-memory store with one table per collection.
    pub fn memory_store(&self) -> MemoryStore {
        CollectionId::ALL.into_iter().fold(MemoryStore::new(), |store, id| {
            store.with_table(self.table(id), id.key_schema())
        })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            leader_info: "leader-info".to_owned(),
            satsang_count: "satsang-count".to_owned(),
            upcoming_events: "upcoming-events".to_owned(),
            kids: "kids-list".to_owned(),
        }
    }
}

// ── Operation results ────────────────────────────────────────────────────────

/// Body returned by a successful write, echoing the submitted record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveConfirmation {
    pub operation: &'static str,
    pub message: &'static str,
    pub item: serde_json::Map<String, serde_json::Value>,
}

impl SaveConfirmation {
    fn new(item: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { operation: "SAVE", message: "SUCCESS", item }
    }
}

/// Every record of a collection, serialized as `{ "<label>": [ ... ] }`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanResult {
    pub label: &'static str,
    pub items: Vec<Item>,
}

impl Serialize for ScanResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.label, &self.items)?;
        map.end()
    }
}

// ── Collection ───────────────────────────────────────────────────────────────

/// Data access for one collection.
pub struct Collection<'a> {
    id: CollectionId,
    table: &'a str,
    store: &'a dyn KeyValueStore,
    max_scan_pages: usize,
}

impl<'a> Collection<'a> {
    pub fn new(
        id: CollectionId,
        table: &'a str,
        store: &'a dyn KeyValueStore,
        max_scan_pages: usize,
    ) -> Self {
        Self { id, table, store, max_scan_pages }
    }

    /// Reads each key attribute from the query string.
    pub fn key_from_query(&self, event: &Event) -> Result<Item> {
        self.id.key_schema()
            .attributes()
            .map(|attr| {
                event.required_query(attr)
                    .map(|value| (attr.to_owned(), AttrValue::S(value.to_owned())))
            })
            .collect()
    }

    /// Point read. `None` when no record has this key.
    pub async fn get_by_key(&self, key: &Item) -> Result<Option<Item>> {
        Ok(self.store.get_item(self.table, key).await?)
    }

    /// Unconditional upsert of `record` at its key.
    pub async fn put(
        &self,
        record: serde_json::Map<String, serde_json::Value>,
    ) -> Result<SaveConfirmation> {
        let item = item_from_json(&record)?;
        self.store.put_item(self.table, item).await?;
        Ok(SaveConfirmation::new(record))
    }

    /// Reads the whole collection, following continuation keys page by page.
    ///
    /// Gives up with [`Error::ScanPageLimit`] if the store still has more
    /// after `max_scan_pages` pages.
    pub async fn scan_all(&self) -> Result<ScanResult> {
        let mut items = Vec::new();
        let mut start_key = None;

        for page in 1..=self.max_scan_pages {
            let ScanPage { items: batch, last_evaluated_key } =
                self.store.scan(self.table, start_key.take()).await?;

            debug!(collection = %self.id, page, records = batch.len(), "scanned page");
            items.extend(batch);

            match last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(ScanResult { label: self.id.label(), items }),
            }
        }

        Err(Error::ScanPageLimit { collection: self.id, pages: self.max_scan_pages })
    }
}
