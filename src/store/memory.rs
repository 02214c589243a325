//! In-process [`KeyValueStore`].
//!
//! Backs the test suite and `--store memory` local runs. Tables are declared
//! up front with their key schema. Key presence and key type are enforced on
//! every call and rejected with the same diagnostics the hosted store uses,
//! so error paths behave identically in both backends.
//!
//! Scans page in key order. Like the hosted store, a page that fills up to
//! the page size always carries a continuation key, even when nothing is
//! left, so callers see a trailing empty page now and then.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Item, KeySchema, KeyValueStore, ScanPage, StoreError};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Key attribute values in schema order.
type RowKey = Vec<String>;

#[derive(Clone, Copy)]
enum KeyUse {
    Item,
    Lookup,
}

struct Table {
    schema: KeySchema,
    rows: BTreeMap<RowKey, Item>,
}

impl Table {
    /// The key attributes of `item`, as a continuation key.
    fn continuation(&self, item: &Item) -> Item {
        self.schema.attributes()
            .filter_map(|attr| item.get(attr).map(|v| (attr.to_owned(), v.clone())))
            .collect()
    }
}

/// A [`KeyValueStore`] held entirely in memory.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { tables: RwLock::new(HashMap::new()), page_size: DEFAULT_PAGE_SIZE }
    }

    /// Maximum records per scan page. Clamped to at least one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Declares an empty table with the given primary key.
    pub fn with_table(mut self, name: impl Into<String>, schema: KeySchema) -> Self {
        self.tables.get_mut().insert(name.into(), Table { schema, rows: BTreeMap::new() });
        self
    }
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or_else(table_not_found)?;
        if key.len() != table.schema.attributes().count() {
            return Err(schema_mismatch());
        }
        let row_key = encode_key(table.schema, key, KeyUse::Lookup)?;
        Ok(table.rows.get(&row_key).cloned())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(table).ok_or_else(table_not_found)?;
        let row_key = encode_key(table.schema, &item, KeyUse::Item)?;
        table.rows.insert(row_key, item);
        Ok(())
    }

    async fn scan(
        &self,
        table: &str,
        exclusive_start_key: Option<Item>,
    ) -> Result<ScanPage, StoreError> {
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or_else(table_not_found)?;

        let lower = match exclusive_start_key {
            Some(key) => Bound::Excluded(encode_key(table.schema, &key, KeyUse::Lookup)?),
            None => Bound::Unbounded,
        };
        let rows: Vec<&Item> = table.rows
            .range::<RowKey, _>((lower, Bound::Unbounded))
            .map(|(_, item)| item)
            .take(self.page_size)
            .collect();

        let last_evaluated_key = match rows.last() {
            Some(item) if rows.len() == self.page_size => Some(table.continuation(item)),
            _ => None,
        };

        Ok(ScanPage {
            items: rows.into_iter().cloned().collect(),
            last_evaluated_key,
        })
    }
}

fn encode_key(schema: KeySchema, item: &Item, usage: KeyUse) -> Result<RowKey, StoreError> {
    let mut parts = Vec::with_capacity(2);
    for attr in schema.attributes() {
        let value = match (item.get(attr), usage) {
            (Some(value), _) => value,
            (None, KeyUse::Item) => {
                return Err(StoreError::Validation(format!(
                    "One or more parameter values were invalid: Missing the key {attr} in the item"
                )));
            }
            (None, KeyUse::Lookup) => return Err(schema_mismatch()),
        };
        let Some(s) = value.as_s() else {
            return Err(match usage {
                KeyUse::Item => StoreError::Validation(format!(
                    "One or more parameter values were invalid: Type mismatch for key {attr} \
                     expected: S actual: {}",
                    value.type_tag()
                )),
                KeyUse::Lookup => schema_mismatch(),
            });
        };
        if s.is_empty() {
            return Err(StoreError::Validation(format!(
                "One or more parameter values are not valid. The AttributeValue for a key \
                 attribute cannot contain an empty string value. Key: {attr}"
            )));
        }
        parts.push(s.to_owned());
    }
    Ok(parts)
}

fn schema_mismatch() -> StoreError {
    StoreError::Validation("The provided key element does not match the schema".to_owned())
}

fn table_not_found() -> StoreError {
    StoreError::ResourceNotFound("Requested resource not found".to_owned())
}
