//! Shared fixtures: an in-memory stack with template `wt-1` registered.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use workflow_admin::config::Config;
use workflow_admin::rest::ApiState;
use workflow_admin::services::{
    AdminAuthorizer, Guards, InMemoryAuditSink, JsonSchemaValidator, Principal, RequestContext,
};
use workflow_admin::store::{
    ConditionalPutRequest, DeleteRequest, GetRequest, InMemoryStore, Item, QueryRequest, Store,
    StoreError,
};
use workflow_admin::versions::{encode_version, LATEST_VERSION};
use workflow_admin::templates::{
    BuiltinPlugin, StepTemplate, TemplateDefinitions, TemplatePlugin, TemplateRegistry,
    WorkflowTemplate,
};

/// Contributes `st-job` v1 and `wt-1` v1
pub struct FixturePlugin;

impl TemplatePlugin for FixturePlugin {
    fn name(&self) -> &str {
        "fixture"
    }

    fn load(&self) -> anyhow::Result<TemplateDefinitions> {
        let step_template: StepTemplate = serde_json::from_value(json!({
            "id": "st-job",
            "v": 1,
            "title": "Job",
            "desc": "Run a job",
            "src": {"plugin": "fixture", "name": "job"},
            "inputManifest": {"sections": [{"children": [
                {"name": "timeout"}, {"name": "retries"}
            ]}]}
        }))?;
        let workflow_template: WorkflowTemplate = serde_json::from_value(json!({
            "id": "wt-1",
            "v": 1,
            "title": "Template",
            "desc": "Template desc",
            "selectedSteps": [{
                "id": "s1",
                "stepTemplateId": "st-job",
                "stepTemplateVer": 1,
                "configs": {"timeout": "30"},
                "configOverrideOption": {"allowed": ["timeout"]}
            }],
            "propsOverrideOption": {"allowed": ["title"]}
        }))?;
        Ok(TemplateDefinitions {
            step_templates: vec![step_template],
            workflow_templates: vec![workflow_template],
        })
    }
}

/// Store that can be told to fail every latest-pointer write
pub struct PointerSwitchStore {
    inner: Arc<InMemoryStore>,
    fail_pointer_writes: AtomicBool,
}

impl PointerSwitchStore {
    pub fn set_fail_pointer_writes(&self, fail: bool) {
        self.fail_pointer_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for PointerSwitchStore {
    async fn get(&self, request: GetRequest) -> Result<Option<Item>, StoreError> {
        self.inner.get(request).await
    }

    async fn conditional_put(&self, request: ConditionalPutRequest) -> Result<(), StoreError> {
        if request.key.sort == encode_version(LATEST_VERSION)
            && self.fail_pointer_writes.load(Ordering::SeqCst)
        {
            return Err(StoreError::Backend("pointer writes disabled".into()));
        }
        self.inner.conditional_put(request).await
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, StoreError> {
        self.inner.query(request).await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), StoreError> {
        self.inner.delete(request).await
    }
}

pub struct Harness {
    pub state: ApiState,
    pub store: Arc<InMemoryStore>,
    pub pointers: Arc<PointerSwitchStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub config: Config,
}

pub fn harness() -> Harness {
    let plugins: Vec<Box<dyn TemplatePlugin>> = vec![Box::new(BuiltinPlugin), Box::new(FixturePlugin)];
    let registry = Arc::new(TemplateRegistry::bootstrap(&plugins).unwrap());
    let audit = Arc::new(InMemoryAuditSink::new());
    let guards = Guards::new(
        Arc::new(AdminAuthorizer),
        Arc::new(JsonSchemaValidator::new().unwrap()),
        audit.clone(),
    );
    let store = Arc::new(InMemoryStore::new());
    let pointers = Arc::new(PointerSwitchStore {
        inner: store.clone(),
        fail_pointer_writes: AtomicBool::new(false),
    });
    let config = Config::default();
    let state = ApiState::new(&config, pointers.clone(), registry, guards);
    Harness {
        state,
        store,
        pointers,
        audit,
        config,
    }
}

pub fn admin() -> RequestContext {
    RequestContext::new(Principal::new("u1", "alice", true))
}

pub fn other_admin() -> RequestContext {
    RequestContext::new(Principal::new("u3", "carol", true))
}

pub fn viewer() -> RequestContext {
    RequestContext::new(Principal::new("u2", "bob", false))
}

/// Manifest for workflow `id` on `wt-1` with the given step configs
pub fn manifest(id: &str, configs: Value) -> Value {
    json!({
        "id": id,
        "workflowTemplateId": "wt-1",
        "workflowTemplateVer": 1,
        "selectedSteps": [{
            "id": "s1",
            "stepTemplateId": "st-job",
            "stepTemplateVer": 1,
            "configs": configs
        }]
    })
}
