//! Key/range record store contract.
//!
//! Records are JSON objects addressed by a partition key and a sort key.
//! Writes are guarded by a [`Predicate`] evaluated against the record
//! currently stored at the key, which gives callers compare-and-swap
//! semantics without any in-process locking.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A stored record. Always a JSON object.
pub type Item = Value;

/// Errors returned by store backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The write predicate did not hold for the stored record
    #[error("conditional check failed")]
    ConditionFailed,

    /// Any other backend failure
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Primary key of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub partition: String,
    pub sort: String,
}

impl Key {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

/// Condition evaluated against the currently stored record before a write
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Unconditional write
    Always,
    /// No record exists at the key
    NotExists,
    /// A record exists at the key
    Exists,
    /// The stored record has `attribute == value`
    AttributeEquals { attribute: String, value: Value },
    /// The stored record has a numeric `attribute <= value`
    AttributeAtMost { attribute: String, value: i64 },
    /// At least one of the predicates holds
    AnyOf(Vec<Predicate>),
    /// Every predicate holds
    AllOf(Vec<Predicate>),
}

impl Predicate {
    pub fn attribute_equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::AttributeEquals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn attribute_at_most(attribute: impl Into<String>, value: i64) -> Self {
        Predicate::AttributeAtMost {
            attribute: attribute.into(),
            value,
        }
    }

    /// Evaluate the predicate against the record currently stored at the key
    pub fn evaluate(&self, existing: Option<&Item>) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::NotExists => existing.is_none(),
            Predicate::Exists => existing.is_some(),
            Predicate::AttributeEquals { attribute, value } => existing
                .and_then(|item| item.get(attribute))
                .is_some_and(|stored| stored == value),
            Predicate::AttributeAtMost { attribute, value } => existing
                .and_then(|item| item.get(attribute))
                .and_then(Value::as_i64)
                .is_some_and(|stored| stored <= *value),
            Predicate::AnyOf(predicates) => predicates.iter().any(|p| p.evaluate(existing)),
            Predicate::AllOf(predicates) => predicates.iter().all(|p| p.evaluate(existing)),
        }
    }
}

/// Range restriction on the sort attribute of a query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortRange {
    #[default]
    All,
    /// Sort key `>= start`
    AtLeast(String),
    /// Sort key within `start..=end`
    Between { start: String, end: String },
}

impl SortRange {
    pub fn contains(&self, sort: &str) -> bool {
        match self {
            SortRange::All => true,
            SortRange::AtLeast(start) => sort >= start.as_str(),
            SortRange::Between { start, end } => sort >= start.as_str() && sort <= end.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub table: String,
    pub key: Key,
}

#[derive(Debug, Clone)]
pub struct ConditionalPutRequest {
    pub table: String,
    pub key: Key,
    pub item: Item,
    pub predicate: Predicate,
}

/// Query by an attribute acting as partition key.
///
/// Results are ordered ascending by `sort_attribute`.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table: String,
    pub partition_attribute: String,
    pub partition_value: String,
    pub sort_attribute: String,
    pub sort: SortRange,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub table: String,
    pub key: Key,
    pub predicate: Predicate,
}

/// Record store operations consumed by the definition engine
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the record at a key
    async fn get(&self, request: GetRequest) -> Result<Option<Item>, StoreError>;

    /// Write a record if the predicate holds for the currently stored one
    async fn conditional_put(&self, request: ConditionalPutRequest) -> Result<(), StoreError>;

    /// Query records sharing a partition attribute value
    async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, StoreError>;

    /// Remove the record at a key if the predicate holds
    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError>;
}
