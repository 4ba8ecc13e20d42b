//! In-process store backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    ConditionalPutRequest, DeleteRequest, GetRequest, Item, Key, QueryRequest, Store, StoreError,
};

/// Store backed by ordered maps, one per table.
///
/// The predicate check and the write happen under the same write lock, so
/// conditional puts are atomic per key.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<Key, Item>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a table
    pub async fn len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, request: GetRequest) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&request.table)
            .and_then(|table| table.get(&request.key))
            .cloned())
    }

    async fn conditional_put(&self, request: ConditionalPutRequest) -> Result<(), StoreError> {
        if !request.item.is_object() {
            return Err(StoreError::Backend("items must be JSON objects".to_string()));
        }

        let mut tables = self.tables.write().await;
        let table = tables.entry(request.table).or_default();

        if !request.predicate.evaluate(table.get(&request.key)) {
            return Err(StoreError::ConditionFailed);
        }

        table.insert(request.key, request.item);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&request.table) else {
            return Ok(vec![]);
        };

        let mut matches: Vec<(&str, &Item)> = table
            .values()
            .filter(|item| {
                item.get(&request.partition_attribute)
                    .and_then(Value::as_str)
                    .is_some_and(|value| value == request.partition_value)
            })
            .filter_map(|item| {
                let sort = item.get(&request.sort_attribute)?.as_str()?;
                request.sort.contains(sort).then_some((sort, item))
            })
            .collect();

        matches.sort_by(|a, b| a.0.cmp(b.0));

        let limit = request.limit.unwrap_or(usize::MAX);
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(request.table).or_default();

        if !request.predicate.evaluate(table.get(&request.key)) {
            return Err(StoreError::ConditionFailed);
        }

        table.remove(&request.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Predicate, SortRange};
    use serde_json::json;

    fn put(key: Key, item: Item, predicate: Predicate) -> ConditionalPutRequest {
        ConditionalPutRequest {
            table: "things".to_string(),
            key,
            item,
            predicate,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        let key = Key::new("a", "1");
        store
            .conditional_put(put(key.clone(), json!({"id": "a", "ver": "1"}), Predicate::Always))
            .await
            .unwrap();

        let item = store
            .get(GetRequest {
                table: "things".to_string(),
                key,
            })
            .await
            .unwrap();
        assert_eq!(item, Some(json!({"id": "a", "ver": "1"})));
    }

    #[tokio::test]
    async fn test_put_not_exists_conflicts() {
        let store = InMemoryStore::new();
        let key = Key::new("a", "1");
        store
            .conditional_put(put(key.clone(), json!({"n": 1}), Predicate::NotExists))
            .await
            .unwrap();

        let result = store
            .conditional_put(put(key, json!({"n": 2}), Predicate::NotExists))
            .await;
        assert_eq!(result, Err(StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn test_put_rejects_non_object() {
        let store = InMemoryStore::new();
        let result = store
            .conditional_put(put(Key::new("a", "1"), json!(5), Predicate::Always))
            .await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_query_orders_by_sort_attribute() {
        let store = InMemoryStore::new();
        for ver in ["v3", "v1", "v2"] {
            store
                .conditional_put(put(
                    Key::new("a", ver),
                    json!({"id": "a", "ver": ver}),
                    Predicate::Always,
                ))
                .await
                .unwrap();
        }
        store
            .conditional_put(put(
                Key::new("b", "v1"),
                json!({"id": "b", "ver": "v1"}),
                Predicate::Always,
            ))
            .await
            .unwrap();

        let items = store
            .query(QueryRequest {
                table: "things".to_string(),
                partition_attribute: "id".to_string(),
                partition_value: "a".to_string(),
                sort_attribute: "ver".to_string(),
                sort: SortRange::AtLeast("v2".to_string()),
                limit: None,
            })
            .await
            .unwrap();

        let vers: Vec<&str> = items.iter().filter_map(|i| i["ver"].as_str()).collect();
        assert_eq!(vers, vec!["v2", "v3"]);
    }

    #[tokio::test]
    async fn test_delete_with_predicate() {
        let store = InMemoryStore::new();
        let key = Key::new("a", "1");
        let request = DeleteRequest {
            table: "things".to_string(),
            key: key.clone(),
            predicate: Predicate::Exists,
        };
        assert_eq!(
            store.delete(request.clone()).await,
            Err(StoreError::ConditionFailed)
        );

        store
            .conditional_put(put(key, json!({"id": "a"}), Predicate::Always))
            .await
            .unwrap();
        store.delete(request).await.unwrap();
        assert_eq!(store.len("things").await, 0);
    }
}
