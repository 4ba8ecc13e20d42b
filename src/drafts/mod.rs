//! Drafts: per-owner working copies that become versions on publish
//!
//! A draft is keyed by its owner's uid and by `"{uid}_{targetId}"`, so an
//! owner holds at most one draft per workflow or template. Saves are
//! last-write-wins; concurrency is only enforced when the draft is
//! published through the versioned write path.

pub mod template;
pub mod workflow;

pub use template::{
    CreateWorkflowTemplateDraftRequest, WorkflowTemplateDraft, WorkflowTemplateDraftService,
};
pub use workflow::{CreateWorkflowDraftRequest, WorkflowDraft, WorkflowDraftService};

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, WorkflowError};
use crate::store::{
    ConditionalPutRequest, DeleteRequest, GetRequest, Key, Predicate, QueryRequest, SortRange,
    Store, StoreError,
};

const UID_ATTRIBUTE: &str = "uid";
const ID_ATTRIBUTE: &str = "id";

/// Draft id for an owner editing a target
pub fn draft_id(uid: &str, target_id: &str) -> String {
    format!("{}_{}", uid, target_id)
}

/// A working copy of `T` owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft<T> {
    pub id: String,
    pub uid: String,
    /// Id of the workflow or template the draft publishes to
    pub target_id: String,
    /// Publishing creates the target instead of updating it
    pub is_new: bool,
    /// Version the draft was seeded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_v: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: T,
}

impl<T> Draft<T> {
    pub fn new(uid: &str, target_id: &str, is_new: bool, base_v: Option<u32>, data: T) -> Self {
        let now = Utc::now();
        Self {
            id: draft_id(uid, target_id),
            uid: uid.to_string(),
            target_id: target_id.to_string(),
            is_new,
            base_v,
            created_at: now,
            updated_at: now,
            data,
        }
    }
}

/// Persistence for drafts of one entity type
pub struct DraftStore<T> {
    store: Arc<dyn Store>,
    table: String,
    entity: &'static str,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for DraftStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table: self.table.clone(),
            entity: self.entity,
            _payload: PhantomData,
        }
    }
}

impl<T> DraftStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: Arc<dyn Store>, table: impl Into<String>, entity: &'static str) -> Self {
        Self {
            store,
            table: table.into(),
            entity,
            _payload: PhantomData,
        }
    }

    /// Insert a new draft; fails with a conflict if the owner already drafts the target
    pub async fn create(&self, draft: &Draft<T>) -> Result<()> {
        match self.put(draft, Predicate::NotExists).await {
            Err(WorkflowError::Store(StoreError::ConditionFailed)) => {
                Err(WorkflowError::conflict(format!(
                    "{} draft {} already exists",
                    self.entity, draft.id
                )))
            }
            other => other,
        }
    }

    /// Overwrite a draft unconditionally
    pub async fn save(&self, draft: &Draft<T>) -> Result<()> {
        self.put(draft, Predicate::Always).await
    }

    async fn put(&self, draft: &Draft<T>, predicate: Predicate) -> Result<()> {
        let item = serde_json::to_value(draft)?;
        self.store
            .conditional_put(ConditionalPutRequest {
                table: self.table.clone(),
                key: Key::new(&draft.uid, &draft.id),
                item,
                predicate,
            })
            .await?;
        debug!("Saved {} draft {}", self.entity, draft.id);
        Ok(())
    }

    pub async fn find(&self, uid: &str, id: &str) -> Result<Option<Draft<T>>> {
        let item = self
            .store
            .get(GetRequest {
                table: self.table.clone(),
                key: Key::new(uid, id),
            })
            .await?;
        Ok(item.map(serde_json::from_value).transpose()?)
    }

    pub async fn must_find(&self, uid: &str, id: &str) -> Result<Draft<T>> {
        self.find(uid, id).await?.ok_or_else(|| {
            WorkflowError::not_found(format!("{} draft {} not found", self.entity, id))
        })
    }

    /// Every draft owned by `uid`, ordered by draft id
    pub async fn list(&self, uid: &str) -> Result<Vec<Draft<T>>> {
        let items = self
            .store
            .query(QueryRequest {
                table: self.table.clone(),
                partition_attribute: UID_ATTRIBUTE.to_string(),
                partition_value: uid.to_string(),
                sort_attribute: ID_ATTRIBUTE.to_string(),
                sort: SortRange::All,
                limit: None,
            })
            .await?;
        items
            .into_iter()
            .map(|item| Ok(serde_json::from_value(item)?))
            .collect()
    }

    /// Remove a draft; fails with not-found if it does not exist
    pub async fn delete(&self, uid: &str, id: &str) -> Result<()> {
        match self
            .store
            .delete(DeleteRequest {
                table: self.table.clone(),
                key: Key::new(uid, id),
                predicate: Predicate::Exists,
            })
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionFailed) => Err(WorkflowError::not_found(format!(
                "{} draft {} not found",
                self.entity, id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

/// Shallow-merge the top-level fields of `patch` into `data`.
///
/// A `null` field clears the value. The result must still deserialize as
/// `T`, otherwise the patch is rejected as invalid input.
pub fn apply_patch<T>(data: &T, patch: &Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(data)?;
    if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            if value.is_null() {
                target.remove(key);
            } else {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    serde_json::from_value(merged).map_err(|e| WorkflowError::validation(e.to_string()))
}
