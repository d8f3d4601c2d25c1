//! Document store abstraction.
//!
//! Records are JSON objects grouped into named tables. Queries are plain
//! equality filters; absence is an `Option`, never an error.

mod schema;
mod sqlite;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::StoreError;

pub(crate) use sqlite::SqliteStore;

pub(crate) const TABLE_SERVICE_CATEGORY: &str = "cc_ServiceCategory";
pub(crate) const TABLE_SERVICE_TEMPLATE: &str = "cc_ServiceTemplate";
pub(crate) const TABLE_BUSINESS: &str = "cc_ApplicationBase";

pub(crate) type StoreResult<T> = std::result::Result<T, StoreError>;

/// Field -> value equality constraints, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Structured values (e.g. `metadata`) must match exactly, not as a subset.
    pub(crate) fn matches(&self, doc: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

pub(crate) trait DocumentStore: Send + Sync {
    fn insert(&self, table: &str, doc: &Value) -> StoreResult<()>;

    fn find_one(&self, table: &str, filter: &Filter) -> StoreResult<Option<Value>>;

    fn find_all(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>>;

    fn count(&self, table: &str, filter: &Filter) -> StoreResult<u64>;

    /// Sets the top-level fields of `doc` on every match. Returns the match count.
    fn update(&self, table: &str, filter: &Filter, doc: &Value) -> StoreResult<u64>;

    /// Adds one to the integer `field` of every match in a single atomic step.
    /// A missing field counts as zero. Returns the match count.
    fn increment(&self, table: &str, filter: &Filter, field: &str) -> StoreResult<u64>;

    /// Returns the number of documents removed.
    fn delete(&self, table: &str, filter: &Filter) -> StoreResult<u64>;

    /// Next value of the per-table counter. Starts at 1.
    fn next_sequence(&self, table: &str) -> StoreResult<u64>;
}

/// Typed access on top of the raw JSON interface.
pub(crate) trait DocumentStoreExt: DocumentStore {
    fn insert_record<T: Serialize>(&self, table: &str, record: &T) -> StoreResult<()> {
        self.insert(table, &serde_json::to_value(record)?)
    }

    fn find_one_record<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &Filter,
    ) -> StoreResult<Option<T>> {
        match self.find_one(table, filter)? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    fn find_all_records<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<T>> {
        self.find_all(table, filter)?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

#[cfg(test)]
mod tests;
