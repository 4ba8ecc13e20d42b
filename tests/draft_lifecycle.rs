//! Draft create/update/publish flows for workflows and workflow templates

mod common;

use serde_json::json;

use common::{admin, harness, manifest, other_admin};
use workflow_admin::WorkflowError;

#[tokio::test]
async fn test_new_workflow_draft_publishes_as_first_version() {
    let h = harness();
    let ctx = admin();
    let drafts = &h.state.workflow_drafts;

    let draft = drafts
        .create_draft(
            &ctx,
            json!({
                "workflowId": "wf-new",
                "isNew": true,
                "workflowTemplateId": "wt-1",
                "workflowTemplateVer": 1,
                "title": "Custom"
            }),
        )
        .await
        .unwrap();
    assert_eq!(draft.id, "u1_wf-new");
    assert!(draft.is_new);
    // Steps are seeded from the template with its default configs
    assert_eq!(draft.data.selected_steps.len(), 1);
    assert_eq!(draft.data.selected_steps[0].configs["timeout"], json!("30"));

    let mut steps = serde_json::to_value(&draft.data.selected_steps).unwrap();
    steps[0]["configs"]["timeout"] = json!("60");
    let updated = drafts
        .update_draft(&ctx, &draft.id, json!({"selectedSteps": steps}))
        .await
        .unwrap();
    assert_eq!(updated.data.selected_steps[0].configs["timeout"], json!("60"));
    assert_eq!(updated.created_at, draft.created_at);

    let record = drafts.publish_draft(&ctx, &draft.id, json!({})).await.unwrap();
    assert_eq!(record.id, "wf-new");
    assert_eq!(record.v, 1);
    assert_eq!(record.data.title, "Custom");
    assert_eq!(
        record.data.get_step("s1").unwrap().configs["timeout"],
        json!("60")
    );

    let err = drafts.find_draft(&ctx, &draft.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert_eq!(
        h.audit.actions(),
        vec![
            "create-workflow-draft",
            "update-workflow-draft",
            "create-workflow",
            "publish-workflow-draft"
        ]
    );
}

#[tokio::test]
async fn test_new_draft_for_existing_workflow_conflicts() {
    let h = harness();
    h.state
        .workflows
        .create_version(&admin(), manifest("wf-1", json!({})))
        .await
        .unwrap();

    let err = h
        .state
        .workflow_drafts
        .create_draft(
            &admin(),
            json!({
                "workflowId": "wf-1",
                "isNew": true,
                "workflowTemplateId": "wt-1",
                "workflowTemplateVer": 1
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
}

#[tokio::test]
async fn test_new_workflow_draft_requires_template() {
    let h = harness();
    let err = h
        .state
        .workflow_drafts
        .create_draft(&admin(), json!({"workflowId": "wf-new", "isNew": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn test_one_draft_per_owner_and_target() {
    let h = harness();
    h.state
        .workflows
        .create_version(&admin(), manifest("wf-1", json!({})))
        .await
        .unwrap();
    let drafts = &h.state.workflow_drafts;
    let body = json!({"workflowId": "wf-1"});

    drafts.create_draft(&admin(), body.clone()).await.unwrap();
    let err = drafts.create_draft(&admin(), body.clone()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));

    // A different owner gets their own draft
    drafts.create_draft(&other_admin(), body).await.unwrap();
    assert_eq!(drafts.list_my_drafts(&admin()).await.unwrap().len(), 1);
    assert_eq!(
        drafts.list_my_drafts(&other_admin()).await.unwrap()[0].id,
        "u3_wf-1"
    );
}

#[tokio::test]
async fn test_existing_workflow_draft_publishes_as_update() {
    let h = harness();
    h.state
        .workflows
        .create_version(&admin(), manifest("wf-1", json!({})))
        .await
        .unwrap();
    let drafts = &h.state.workflow_drafts;

    let draft = drafts
        .create_draft(&other_admin(), json!({"workflowId": "wf-1"}))
        .await
        .unwrap();
    assert!(!draft.is_new);
    assert_eq!(draft.base_v, Some(1));
    assert_eq!(draft.data.rev, Some(0));

    let record = drafts
        .publish_draft(&other_admin(), &draft.id, json!({"title": "Renamed"}))
        .await
        .unwrap();
    assert_eq!(record.v, 1);
    assert_eq!(record.rev, 1);
    assert_eq!(record.created_by, "u1");
    assert_eq!(record.updated_by, "u3");
    assert_eq!(record.data.title, "Renamed");
    assert_eq!(
        h.state.workflows.must_find_latest("wf-1").await.unwrap().rev,
        1
    );
}

#[tokio::test]
async fn test_forbidden_publish_keeps_the_draft() {
    let h = harness();
    h.state
        .workflows
        .create_version(&admin(), manifest("wf-1", json!({})))
        .await
        .unwrap();
    let drafts = &h.state.workflow_drafts;
    let draft = drafts
        .create_draft(&admin(), json!({"workflowId": "wf-1"}))
        .await
        .unwrap();

    let err = drafts
        .publish_draft(&admin(), &draft.id, json!({"desc": "Not allowed"}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let kept = drafts.find_draft(&admin(), &draft.id).await.unwrap();
    assert_eq!(kept.data.desc.as_deref(), Some("Not allowed"));
    assert_eq!(
        h.state.workflows.must_find_version("wf-1", 1).await.unwrap().rev,
        0
    );
}

#[tokio::test]
async fn test_delete_draft() {
    let h = harness();
    let drafts = &h.state.workflow_drafts;
    let draft = drafts
        .create_draft(
            &admin(),
            json!({
                "workflowId": "wf-new",
                "isNew": true,
                "workflowTemplateId": "wt-1",
                "workflowTemplateVer": 1
            }),
        )
        .await
        .unwrap();

    drafts.delete_draft(&admin(), &draft.id).await.unwrap();
    let err = drafts.delete_draft(&admin(), &draft.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn test_template_draft_publishes_usable_template() {
    let h = harness();
    let ctx = admin();
    let drafts = &h.state.template_drafts;

    let draft = drafts
        .create_draft(
            &ctx,
            json!({"templateId": "wt-custom", "isNew": true, "title": "Locked job"}),
        )
        .await
        .unwrap();
    assert_eq!(draft.id, "u1_wt-custom");
    assert!(draft.data.selected_steps.is_empty());

    drafts
        .update_draft(
            &ctx,
            &draft.id,
            json!({
                "selectedSteps": [{
                    "id": "lock",
                    "stepTemplateId": "st-obtain-write-lock",
                    "stepTemplateVer": 1,
                    "configs": {"lockKey": "images", "timeout": "30"},
                    "configOverrideOption": {"allowed": ["timeout"]}
                }],
                "propsOverrideOption": {"allowed": ["title"]}
            }),
        )
        .await
        .unwrap();

    let record = drafts.publish_draft(&ctx, &draft.id, json!({})).await.unwrap();
    assert_eq!(record.id, "wt-custom");
    assert_eq!(record.v, 1);
    assert!(record.data.is_hydrated());

    // Workflows can now be built on the published template
    let workflow = h
        .state
        .workflows
        .create_version(
            &ctx,
            json!({
                "id": "wf-locked",
                "workflowTemplateId": "wt-custom",
                "workflowTemplateVer": 1,
                "title": "Mine",
                "selectedSteps": [{
                    "id": "lock",
                    "stepTemplateId": "st-obtain-write-lock",
                    "stepTemplateVer": 1,
                    "configs": {"timeout": "90"}
                }]
            }),
        )
        .await
        .unwrap();
    let step = workflow.data.get_step("lock").unwrap();
    assert_eq!(step.configs["lockKey"], json!("images"));
    assert_eq!(step.configs["timeout"], json!("90"));
}

#[tokio::test]
async fn test_template_draft_for_plugin_template_conflicts() {
    let h = harness();
    let err = h
        .state
        .template_drafts
        .create_draft(&admin(), json!({"templateId": "wt-1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
}

#[tokio::test]
async fn test_existing_template_draft_updates_latest_version() {
    let h = harness();
    let ctx = admin();
    h.state
        .templates
        .create_version(
            &ctx,
            json!({"id": "wt-custom", "title": "First", "selectedSteps": []}),
        )
        .await
        .unwrap();

    let drafts = &h.state.template_drafts;
    let draft = drafts
        .create_draft(&ctx, json!({"templateId": "wt-custom"}))
        .await
        .unwrap();
    assert_eq!(draft.base_v, Some(1));

    let record = drafts
        .publish_draft(&ctx, &draft.id, json!({"title": "Second"}))
        .await
        .unwrap();
    assert_eq!(record.rev, 1);
    assert_eq!(record.data.title, "Second");
}

#[tokio::test]
async fn test_template_switch_reseeds_steps_unless_steps_given() {
    let h = harness();
    let ctx = admin();
    let drafts = &h.state.workflow_drafts;
    let draft = drafts
        .create_draft(
            &ctx,
            json!({
                "workflowId": "wf-new",
                "isNew": true,
                "workflowTemplateId": "wt-1",
                "workflowTemplateVer": 1
            }),
        )
        .await
        .unwrap();

    let switched = drafts
        .update_draft(&ctx, &draft.id, json!({"workflowTemplateId": "wt-provision-fleet"}))
        .await
        .unwrap();
    let ids: Vec<&str> = switched
        .data
        .selected_steps
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, vec!["obtain-lock", "create-fleet", "release-lock"]);
    assert_eq!(
        switched.data.selected_steps[0].configs["lockKey"],
        json!("appstream-images")
    );

    // Steps supplied alongside the switch are kept as given
    let explicit = drafts
        .update_draft(
            &ctx,
            &draft.id,
            json!({
                "workflowTemplateId": "wt-1",
                "selectedSteps": [{
                    "id": "custom",
                    "stepTemplateId": "st-job",
                    "stepTemplateVer": 1,
                    "configs": {"timeout": "5"}
                }]
            }),
        )
        .await
        .unwrap();
    assert_eq!(explicit.data.workflow_template_id, "wt-1");
    assert_eq!(explicit.data.selected_steps.len(), 1);
    assert_eq!(explicit.data.selected_steps[0].id, "custom");
    assert_eq!(explicit.data.selected_steps[0].configs["timeout"], json!("5"));

    // Patches that keep the template leave the steps alone
    let retitled = drafts
        .update_draft(&ctx, &draft.id, json!({"title": "Renamed"}))
        .await
        .unwrap();
    assert_eq!(retitled.data.selected_steps[0].id, "custom");
}

#[tokio::test]
async fn test_publish_uses_current_rev_when_pointer_lags() {
    let h = harness();
    let ctx = admin();
    h.state
        .workflows
        .create_version(&ctx, manifest("wf-1", json!({})))
        .await
        .unwrap();

    // The version moves to rev 1 but the pointer keeps its rev 0 copy
    h.pointers.set_fail_pointer_writes(true);
    let mut update = manifest("wf-1", json!({"timeout": "45"}));
    update["v"] = json!(1);
    update["rev"] = json!(0);
    h.state.workflows.update_version(&ctx, update).await.unwrap();
    h.pointers.set_fail_pointer_writes(false);
    assert_eq!(h.state.workflows.must_find_latest("wf-1").await.unwrap().rev, 0);

    let drafts = &h.state.workflow_drafts;
    let draft = drafts
        .create_draft(&other_admin(), json!({"workflowId": "wf-1"}))
        .await
        .unwrap();
    let record = drafts
        .publish_draft(&other_admin(), &draft.id, json!({"title": "Renamed"}))
        .await
        .unwrap();
    assert_eq!(record.rev, 2);
    assert_eq!(record.data.title, "Renamed");
    assert_eq!(h.state.workflows.must_find_latest("wf-1").await.unwrap().rev, 2);
}

#[tokio::test]
async fn test_template_publish_uses_current_rev_when_pointer_lags() {
    let h = harness();
    let ctx = admin();
    let body = json!({"id": "wt-custom", "title": "First", "selectedSteps": []});
    h.state
        .templates
        .create_version(&ctx, body.clone())
        .await
        .unwrap();

    h.pointers.set_fail_pointer_writes(true);
    let mut update = body;
    update["v"] = json!(1);
    update["rev"] = json!(0);
    update["title"] = json!("Second");
    h.state.templates.update_version(&ctx, update).await.unwrap();
    h.pointers.set_fail_pointer_writes(false);

    let drafts = &h.state.template_drafts;
    let draft = drafts
        .create_draft(&ctx, json!({"templateId": "wt-custom"}))
        .await
        .unwrap();
    let record = drafts
        .publish_draft(&ctx, &draft.id, json!({"title": "Third"}))
        .await
        .unwrap();
    assert_eq!(record.rev, 2);
    assert_eq!(record.data.title, "Third");
}
