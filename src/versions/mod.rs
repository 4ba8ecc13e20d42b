//! Append-only version records with a mutable latest pointer
//!
//! Every logical entity is stored under one partition key (`id`). Versions
//! `v >= 1` live at sort key `encode_version(v)` and change only through the
//! rev-gated update path. The record at `encode_version(0)` is the
//! [`LatestPointer`]: it names the latest version and carries a copy of it.
//!
//! The pointer is maintained best-effort. Its writes are conditional and a
//! lost race is dropped, so readers should treat it as a hint that is
//! eventually correct once writers stop.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, WorkflowError};
use crate::store::{
    ConditionalPutRequest, DeleteRequest, GetRequest, Item, Key, Predicate, QueryRequest,
    SortRange, Store, StoreError,
};

/// Partition attribute of version tables
pub const ID_ATTRIBUTE: &str = "id";
/// Sort attribute of version tables
pub const VER_ATTRIBUTE: &str = "ver";
/// Version number reserved for the latest pointer
pub const LATEST_VERSION: u32 = 0;

/// Encode a version number as a sort key that orders numerically
pub fn encode_version(v: u32) -> String {
    format!("v{:010}", v)
}

/// Recover the version number from its sort key
pub fn decode_version(ver: &str) -> Option<u32> {
    let digits = ver.strip_prefix('v')?;
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One immutable version of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord<T> {
    pub id: String,
    pub ver: String,
    pub v: u32,
    pub rev: u64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub data: T,
}

/// The `v = 0` record naming the latest version of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPointer<T> {
    pub id: String,
    pub ver: String,
    pub latest: u32,
    /// `rev` of the copied record; guards against stale refreshes
    #[serde(default)]
    pub latest_rev: u64,
    pub record: VersionRecord<T>,
}

/// Both record kinds sharing a partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoredRecord<T> {
    Version(VersionRecord<T>),
    Latest(LatestPointer<T>),
}

/// Versioned persistence for one entity type in one table
pub struct VersionedWriter<T> {
    store: Arc<dyn Store>,
    table: String,
    entity: &'static str,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for VersionedWriter<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table: self.table.clone(),
            entity: self.entity,
            _payload: PhantomData,
        }
    }
}

impl<T> VersionedWriter<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// `entity` names the stored type in error messages (e.g. "workflow")
    pub fn new(store: Arc<dyn Store>, table: impl Into<String>, entity: &'static str) -> Self {
        Self {
            store,
            table: table.into(),
            entity,
            _payload: PhantomData,
        }
    }

    /// Insert version `v` of `id` with `rev = 0`.
    ///
    /// Fails with a conflict if the version already exists. On success the
    /// latest pointer is advanced unless it already names a newer version.
    pub async fn create_version(
        &self,
        id: &str,
        v: u32,
        data: T,
        actor: &str,
    ) -> Result<VersionRecord<T>> {
        check_version(v)?;

        let now = Utc::now();
        let record = VersionRecord {
            id: id.to_string(),
            ver: encode_version(v),
            v,
            rev: 0,
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
            data,
        };

        let item = serde_json::to_value(StoredRecord::Version(record.clone()))?;
        match self
            .store
            .conditional_put(ConditionalPutRequest {
                table: self.table.clone(),
                key: Key::new(id, encode_version(v)),
                item,
                predicate: Predicate::NotExists,
            })
            .await
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(WorkflowError::conflict(format!(
                    "{} {} v{} already exists",
                    self.entity, id, v
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Created {} {} v{}", self.entity, id, v);

        self.write_pointer(
            &record,
            Predicate::AnyOf(vec![
                Predicate::NotExists,
                Predicate::attribute_at_most("latest", i64::from(v)),
            ]),
        )
        .await;

        Ok(record)
    }

    /// Replace version `v` of `id` if its stored `rev` equals `rev`.
    ///
    /// The new record keeps the creation metadata and carries `rev + 1`.
    /// The latest pointer is refreshed only if it names exactly `v` and does
    /// not already hold a newer rev of it.
    pub async fn update_version(
        &self,
        id: &str,
        v: u32,
        rev: u64,
        data: T,
        actor: &str,
    ) -> Result<VersionRecord<T>> {
        let next_rev = rev.checked_add(1).ok_or_else(|| {
            WorkflowError::validation(format!("rev {} is out of range", rev))
        })?;
        let existing = self.must_find_version(id, v).await?;

        let record = VersionRecord {
            id: id.to_string(),
            ver: encode_version(v),
            v,
            rev: next_rev,
            created_at: existing.created_at,
            created_by: existing.created_by,
            updated_at: Utc::now(),
            updated_by: actor.to_string(),
            data,
        };

        let item = serde_json::to_value(StoredRecord::Version(record.clone()))?;
        match self
            .store
            .conditional_put(ConditionalPutRequest {
                table: self.table.clone(),
                key: Key::new(id, encode_version(v)),
                item,
                predicate: Predicate::attribute_equals("rev", rev),
            })
            .await
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                let current = self.must_find_version(id, v).await?;
                return Err(WorkflowError::conflict(format!(
                    "{} {} v{} was updated by {} (current rev {}, submitted rev {})",
                    self.entity, id, v, current.updated_by, current.rev, rev
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Updated {} {} v{} to rev {}", self.entity, id, v, record.rev);

        self.write_pointer(
            &record,
            Predicate::AllOf(vec![
                Predicate::attribute_equals("latest", v),
                Predicate::attribute_at_most("latestRev", i64::try_from(rev).unwrap_or(i64::MAX)),
            ]),
        )
        .await;

        Ok(record)
    }

    async fn write_pointer(&self, record: &VersionRecord<T>, predicate: Predicate) {
        let pointer = StoredRecord::Latest(LatestPointer {
            id: record.id.clone(),
            ver: encode_version(LATEST_VERSION),
            latest: record.v,
            latest_rev: record.rev,
            record: record.clone(),
        });

        let item = match serde_json::to_value(&pointer) {
            Ok(item) => item,
            Err(e) => {
                warn!(
                    "Failed to serialize latest pointer for {} {}: {}",
                    self.entity, record.id, e
                );
                return;
            }
        };

        match self
            .store
            .conditional_put(ConditionalPutRequest {
                table: self.table.clone(),
                key: Key::new(&record.id, encode_version(LATEST_VERSION)),
                item,
                predicate,
            })
            .await
        {
            Ok(()) => debug!(
                "Latest pointer for {} {} now at v{}",
                self.entity, record.id, record.v
            ),
            Err(StoreError::ConditionFailed) => debug!(
                "Latest pointer for {} {} not moved to v{}: condition not met",
                self.entity, record.id, record.v
            ),
            Err(e) => warn!(
                "Failed to write latest pointer for {} {} v{}: {}",
                self.entity, record.id, record.v, e
            ),
        }
    }

    /// Fetch one version; `v` must be at least 1
    pub async fn find_version(&self, id: &str, v: u32) -> Result<Option<VersionRecord<T>>> {
        check_version(v)?;
        match self.get(id, v).await? {
            Some(StoredRecord::Version(record)) => Ok(Some(record)),
            Some(StoredRecord::Latest(_)) | None => Ok(None),
        }
    }

    pub async fn must_find_version(&self, id: &str, v: u32) -> Result<VersionRecord<T>> {
        self.find_version(id, v).await?.ok_or_else(|| {
            WorkflowError::not_found(format!("{} {} v{} not found", self.entity, id, v))
        })
    }

    /// The version the latest pointer currently names
    pub async fn find_latest(&self, id: &str) -> Result<Option<VersionRecord<T>>> {
        match self.get(id, LATEST_VERSION).await? {
            Some(StoredRecord::Latest(pointer)) => Ok(Some(pointer.record)),
            Some(StoredRecord::Version(_)) | None => Ok(None),
        }
    }

    pub async fn must_find_latest(&self, id: &str) -> Result<VersionRecord<T>> {
        self.find_latest(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("{} {} not found", self.entity, id)))
    }

    /// Every version of `id`, ascending
    pub async fn list_versions(&self, id: &str) -> Result<Vec<VersionRecord<T>>> {
        let items = self
            .store
            .query(QueryRequest {
                table: self.table.clone(),
                partition_attribute: ID_ATTRIBUTE.to_string(),
                partition_value: id.to_string(),
                sort_attribute: VER_ATTRIBUTE.to_string(),
                sort: SortRange::AtLeast(encode_version(1)),
                limit: None,
            })
            .await?;

        let mut versions = Vec::with_capacity(items.len());
        for item in items {
            if let StoredRecord::Version(record) = parse_item(item)? {
                versions.push(record);
            }
        }
        Ok(versions)
    }

    /// Latest version of every entity in the table, ordered by id
    pub async fn list_latest(&self) -> Result<Vec<VersionRecord<T>>> {
        let items = self
            .store
            .query(QueryRequest {
                table: self.table.clone(),
                partition_attribute: VER_ATTRIBUTE.to_string(),
                partition_value: encode_version(LATEST_VERSION),
                sort_attribute: ID_ATTRIBUTE.to_string(),
                sort: SortRange::All,
                limit: None,
            })
            .await?;

        let mut latest = Vec::with_capacity(items.len());
        for item in items {
            if let StoredRecord::Latest(pointer) = parse_item(item)? {
                latest.push(pointer.record);
            }
        }
        Ok(latest)
    }

    /// Delete every version of `id`, then its pointer.
    ///
    /// Deletes are independent; a failure part way leaves the remaining
    /// records in place. Returns the number of versions removed.
    pub async fn delete_all_versions(&self, id: &str) -> Result<usize> {
        let versions = self.list_versions(id).await?;

        for record in &versions {
            self.store
                .delete(DeleteRequest {
                    table: self.table.clone(),
                    key: Key::new(id, &record.ver),
                    predicate: Predicate::Always,
                })
                .await?;
        }

        match self
            .store
            .delete(DeleteRequest {
                table: self.table.clone(),
                key: Key::new(id, encode_version(LATEST_VERSION)),
                predicate: Predicate::Exists,
            })
            .await
        {
            Ok(()) | Err(StoreError::ConditionFailed) => {}
            Err(e) => return Err(e.into()),
        }

        info!(
            "Deleted {} versions of {} {}",
            versions.len(),
            self.entity,
            id
        );
        Ok(versions.len())
    }

    async fn get(&self, id: &str, v: u32) -> Result<Option<StoredRecord<T>>> {
        let item = self
            .store
            .get(GetRequest {
                table: self.table.clone(),
                key: Key::new(id, encode_version(v)),
            })
            .await?;
        item.map(parse_item).transpose()
    }
}

fn check_version(v: u32) -> Result<()> {
    if v == LATEST_VERSION {
        return Err(WorkflowError::validation(
            "version 0 is reserved; versions start at 1",
        ));
    }
    Ok(())
}

fn parse_item<T: DeserializeOwned>(item: Item) -> Result<StoredRecord<T>> {
    Ok(serde_json::from_value(item)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    fn writer() -> VersionedWriter<Value> {
        VersionedWriter::new(Arc::new(InMemoryStore::new()), "things", "thing")
    }

    #[test]
    fn test_version_encoding_sorts_numerically() {
        assert_eq!(encode_version(0), "v0000000000");
        assert_eq!(encode_version(12), "v0000000012");
        assert!(encode_version(9) < encode_version(10));
        assert!(encode_version(9999) < encode_version(10000));
        assert_eq!(decode_version(&encode_version(4_000_000)), Some(4_000_000));
        assert_eq!(decode_version("v12"), None);
        assert_eq!(decode_version("x0000000001"), None);
    }

    #[test]
    fn test_stored_record_is_tagged() {
        let now = Utc::now();
        let record = StoredRecord::Version(VersionRecord {
            id: "a".into(),
            ver: encode_version(1),
            v: 1,
            rev: 0,
            created_at: now,
            created_by: "u".into(),
            updated_at: now,
            updated_by: "u".into(),
            data: json!({"x": 1}),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "version");
        assert_eq!(value["id"], "a");
        assert_eq!(value["ver"], "v0000000001");
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let writer = writer();
        let record = writer
            .create_version("a", 1, json!({"n": 1}), "alice")
            .await
            .unwrap();
        assert_eq!(record.rev, 0);

        let err = writer
            .create_version("a", 1, json!({"n": 2}), "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        assert!(err.to_string().contains("already exists"));

        let stored = writer.must_find_version("a", 1).await.unwrap();
        assert_eq!(stored.data, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_version_zero_rejected() {
        let writer = writer();
        let err = writer
            .create_version("a", 0, json!({}), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(matches!(
            writer.find_version("a", 0).await,
            Err(WorkflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_increments_rev_and_keeps_creator() {
        let writer = writer();
        writer
            .create_version("a", 1, json!({"n": 1}), "alice")
            .await
            .unwrap();

        let updated = writer
            .update_version("a", 1, 0, json!({"n": 2}), "bob")
            .await
            .unwrap();
        assert_eq!(updated.rev, 1);
        assert_eq!(updated.created_by, "alice");
        assert_eq!(updated.updated_by, "bob");

        let latest = writer.must_find_latest("a").await.unwrap();
        assert_eq!(latest.data, json!({"n": 2}));
        assert_eq!(latest.rev, 1);
    }

    #[tokio::test]
    async fn test_stale_rev_conflicts_without_mutation() {
        let writer = writer();
        writer
            .create_version("a", 1, json!({"n": 1}), "alice")
            .await
            .unwrap();
        writer
            .update_version("a", 1, 0, json!({"n": 2}), "bob")
            .await
            .unwrap();

        let err = writer
            .update_version("a", 1, 0, json!({"n": 3}), "carol")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        assert!(err.to_string().contains("bob"));

        let stored = writer.must_find_version("a", 1).await.unwrap();
        assert_eq!(stored.rev, 1);
        assert_eq!(stored.data, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let err = writer()
            .update_version("a", 3, 0, json!({}), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pointer_never_moves_backwards() {
        let writer = writer();
        writer
            .create_version("a", 2, json!({"n": 2}), "alice")
            .await
            .unwrap();
        writer
            .create_version("a", 1, json!({"n": 1}), "bob")
            .await
            .unwrap();

        let latest = writer.must_find_latest("a").await.unwrap();
        assert_eq!(latest.v, 2);

        // Updating a non-latest version leaves the pointer alone
        writer
            .update_version("a", 1, 0, json!({"n": 10}), "bob")
            .await
            .unwrap();
        let latest = writer.must_find_latest("a").await.unwrap();
        assert_eq!(latest.v, 2);
        assert_eq!(latest.data, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_list_versions_and_latest() {
        let writer = writer();
        for v in [1, 2, 3] {
            writer
                .create_version("a", v, json!({"v": v}), "alice")
                .await
                .unwrap();
        }
        writer
            .create_version("b", 1, json!({"v": 1}), "alice")
            .await
            .unwrap();

        let versions: Vec<u32> = writer
            .list_versions("a")
            .await
            .unwrap()
            .iter()
            .map(|r| r.v)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);

        let latest: Vec<(String, u32)> = writer
            .list_latest()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.id, r.v))
            .collect();
        assert_eq!(latest, vec![("a".to_string(), 3), ("b".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_delete_all_versions() {
        let writer = writer();
        for v in [1, 2] {
            writer
                .create_version("a", v, json!({}), "alice")
                .await
                .unwrap();
        }

        assert_eq!(writer.delete_all_versions("a").await.unwrap(), 2);
        assert!(writer.find_latest("a").await.unwrap().is_none());
        assert!(writer.list_versions("a").await.unwrap().is_empty());
        assert_eq!(writer.delete_all_versions("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rev_overflow_is_rejected() {
        let writer = writer();
        writer
            .create_version("a", 1, json!({}), "alice")
            .await
            .unwrap();

        let err = writer
            .update_version("a", 1, u64::MAX, json!({}), "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(writer.must_find_version("a", 1).await.unwrap().rev, 0);
    }

    /// Holds back the first pointer write after `arm` until `release`
    struct GatedStore {
        inner: InMemoryStore,
        armed: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: InMemoryStore::new(),
                armed: AtomicBool::new(false),
                reached: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Store for GatedStore {
        async fn get(&self, request: GetRequest) -> std::result::Result<Option<Item>, StoreError> {
            self.inner.get(request).await
        }

        async fn conditional_put(
            &self,
            request: ConditionalPutRequest,
        ) -> std::result::Result<(), StoreError> {
            let is_pointer = request.key.sort == encode_version(LATEST_VERSION);
            if is_pointer && self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.conditional_put(request).await
        }

        async fn query(&self, request: QueryRequest) -> std::result::Result<Vec<Item>, StoreError> {
            self.inner.query(request).await
        }

        async fn delete(&self, request: DeleteRequest) -> std::result::Result<(), StoreError> {
            self.inner.delete(request).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delayed_pointer_write_does_not_roll_back_rev() {
        let store = Arc::new(GatedStore::new());
        let writer: VersionedWriter<Value> =
            VersionedWriter::new(store.clone(), "things", "thing");
        writer
            .create_version("a", 1, json!({"n": 0}), "alice")
            .await
            .unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let slow = {
            let writer = writer.clone();
            tokio::spawn(async move {
                writer
                    .update_version("a", 1, 0, json!({"n": 1}), "alice")
                    .await
            })
        };
        store.reached.notified().await;

        writer
            .update_version("a", 1, 1, json!({"n": 2}), "bob")
            .await
            .unwrap();
        store.release.notify_one();
        slow.await.unwrap().unwrap();

        let latest = writer.must_find_latest("a").await.unwrap();
        assert_eq!(latest.rev, 2);
        assert_eq!(latest.data, json!({"n": 2}));

        // The pointer copy is usable for a follow-up update
        writer
            .update_version("a", 1, latest.rev, json!({"n": 3}), "carol")
            .await
            .unwrap();
    }
}
