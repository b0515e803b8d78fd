//! Integration tests for the workflow state machine

use hera_core::config::Config;
use hera_core::contract::*;
use hera_core::domain::repository::RelationshipRepository;
use hera_core::domain::workflow::{
    AUDIT_TRANSACTION_TYPE, CAN_TRANSITION_TO, HAS_STAGE, HAS_WORKFLOW_STATUS,
    TRANSITION_SMART_CODE,
};
use hera_core::domain::SmartCodePolicy;
use serde_json::json;
use std::sync::atomic::Ordering;
use uuid::Uuid;

mod common;
use common::{appointment_workflow, create_entity, print_test_header, service, service_with};

/// Status entity ids of a loaded template, by code
async fn status_ids(
    service: &hera_core::domain::Service,
    org: Uuid,
    template_id: Uuid,
) -> std::collections::HashMap<String, Uuid> {
    service
        .load_workflow(org, template_id)
        .await
        .unwrap()
        .stages()
        .iter()
        .map(|n| (n.code.clone(), n.status_id))
        .collect()
}

#[tokio::test]
async fn test_define_and_load_workflow() {
    print_test_header(
        "test_define_and_load_workflow",
        &["A definition round-trips through entities and edges into a graph"],
    );
    let (service, store) = service();
    let org = Uuid::new_v4();

    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    store.print_state("after define");

    let graph = service.load_workflow(org, template_id).await.unwrap();
    let codes: Vec<&str> = graph.stages().iter().map(|n| n.code.as_str()).collect();
    assert_eq!(codes, ["SCHEDULED", "CONFIRMED", "CHECKED_IN", "COMPLETED", "CANCELLED"]);
    assert_eq!(graph.initial().code, "SCHEDULED");

    let scheduled = graph.status_by_code("SCHEDULED").unwrap().status_id;
    let cancelled = graph.status_by_code("CANCELLED").unwrap().status_id;
    assert!(graph.transition(scheduled, cancelled).unwrap().requires_approval);
    assert!(graph.is_final(cancelled));

    // Status codes are scoped per template
    let mut other = appointment_workflow();
    other.template_code = Some("APPOINTMENT_LIFECYCLE_V2".to_string());
    service.define_workflow(org, other).await.unwrap();
}

#[tokio::test]
async fn test_definition_checks_run_before_writes() {
    print_test_header(
        "test_definition_checks_run_before_writes",
        &["Several initial stages or undefined transition targets are rejected up front"],
    );
    let (service, store) = service();
    let org = Uuid::new_v4();

    let mut two_initial = appointment_workflow();
    two_initial.stages[1].flags.is_initial = true;
    let err = service.define_workflow(org, two_initial).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let mut dangling = appointment_workflow();
    dangling.transitions.push(TransitionDefinition {
        from: "COMPLETED".to_string(),
        to: "REFUNDED".to_string(),
        flags: TransitionFlags::default(),
    });
    let err = service.define_workflow(org, dangling).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let mut no_initial = appointment_workflow();
    no_initial.stages[0].flags.is_initial = false;
    assert!(service.define_workflow(org, no_initial).await.is_err());

    assert_eq!(store.entity_count(), 0);
    assert_eq!(store.relationship_count(), 0);
}

#[tokio::test]
async fn test_illegal_transition_is_rejected() {
    print_test_header(
        "test_illegal_transition_is_rejected",
        &["SCHEDULED -> CHECKED_IN has no edge and must fail without changing state"],
    );
    let (service, _) = service();
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;
    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;

    service
        .start_workflow(org, appointment.id, Some(template_id), &Actor::system())
        .await
        .unwrap();

    assert!(!service
        .can_transition(org, ids["SCHEDULED"], ids["CHECKED_IN"])
        .await
        .unwrap());
    assert!(service
        .can_transition(org, ids["SCHEDULED"], ids["CONFIRMED"])
        .await
        .unwrap());

    let err = service
        .apply_transition(org, appointment.id, ids["CHECKED_IN"], &Actor::approver(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::IllegalTransition {
            from: ids["SCHEDULED"],
            to: ids["CHECKED_IN"],
        }
    );

    let current = service.current_status(org, appointment.id).await.unwrap().unwrap();
    assert_eq!(current.entity_code, "SCHEDULED");
    let record = service.get_entity(org, appointment.id).await.unwrap();
    assert_eq!(record.status, "SCHEDULED");
}

#[tokio::test]
async fn test_transition_moves_record_and_writes_audit() {
    print_test_header(
        "test_transition_moves_record_and_writes_audit",
        &[
            "Old link deactivated, new link active, status mirrored",
            "Each move appends a workflow_transition ledger entry",
        ],
    );
    let (service, store) = service();
    let org = Uuid::new_v4();
    let actor = Actor::user(Uuid::new_v4());
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;
    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;

    let started = service
        .start_workflow(org, appointment.id, Some(template_id), &actor)
        .await
        .unwrap();
    assert_eq!(started.metadata["from_status_id"], serde_json::Value::Null);

    let mut available: Vec<String> = service
        .available_transitions(org, appointment.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.status.entity_code)
        .collect();
    available.sort();
    assert_eq!(available, ["CANCELLED", "CONFIRMED"]);

    let audit = service
        .apply_transition(org, appointment.id, ids["CONFIRMED"], &actor)
        .await
        .unwrap();
    store.print_state("after transition");

    assert_eq!(audit.transaction_type, AUDIT_TRANSACTION_TYPE);
    assert_eq!(audit.source_entity_id, Some(appointment.id));
    assert_eq!(
        audit.metadata["from_status_id"],
        serde_json::json!(ids["SCHEDULED"])
    );
    assert_eq!(audit.metadata["to_status_id"], serde_json::json!(ids["CONFIRMED"]));
    assert_eq!(audit.metadata["actor_id"], serde_json::json!(actor.actor_id));
    assert_eq!(audit.metadata["template_id"], serde_json::json!(template_id));
    assert_eq!(store.transactions_of_type(AUDIT_TRANSACTION_TYPE).len(), 2);

    let record = service.get_entity(org, appointment.id).await.unwrap();
    assert_eq!(record.status, "CONFIRMED");

    let links = service
        .query_relationships(
            org,
            RelationshipFilter {
                from_entity_id: Some(appointment.id),
                relationship_type: Some(HAS_WORKFLOW_STATUS.to_string()),
                include_inactive: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links.iter().filter(|l| l.is_active).count(), 1);
    assert_eq!(
        links.iter().find(|l| l.is_active).map(|l| l.to_entity_id),
        Some(ids["CONFIRMED"])
    );

    service
        .apply_transition(org, appointment.id, ids["CHECKED_IN"], &actor)
        .await
        .unwrap();
    assert_eq!(
        service.get_entity(org, appointment.id).await.unwrap().status,
        "CHECKED_IN"
    );
}

#[tokio::test]
async fn test_approval_gated_transition() {
    print_test_header(
        "test_approval_gated_transition",
        &["SCHEDULED -> CANCELLED requires an actor who can approve"],
    );
    let (service, _) = service();
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;
    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;
    service
        .start_workflow(org, appointment.id, Some(template_id), &Actor::system())
        .await
        .unwrap();

    let err = service
        .apply_transition(org, appointment.id, ids["CANCELLED"], &Actor::user(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::ApprovalRequired {
            from: ids["SCHEDULED"],
            to: ids["CANCELLED"],
        }
    );

    service
        .apply_transition(org, appointment.id, ids["CANCELLED"], &Actor::approver(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(
        service.get_entity(org, appointment.id).await.unwrap().status,
        "CANCELLED"
    );
    assert!(service
        .available_transitions(org, appointment.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_start_workflow_uses_policy_template() {
    print_test_header(
        "test_start_workflow_uses_policy_template",
        &["Without an explicit template the smart code policy decides"],
    );
    let (service, _) = service();
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();

    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;
    let err = service
        .start_workflow(org, appointment.id, None, &Actor::system())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    service
        .register_policy(
            "HERA.SALON.APPOINTMENT",
            SmartCodePolicy {
                workflow_template: Some(template_id),
                ..Default::default()
            },
        )
        .unwrap();
    service
        .start_workflow(org, appointment.id, None, &Actor::system())
        .await
        .unwrap();
    assert_eq!(
        service.get_entity(org, appointment.id).await.unwrap().status,
        "SCHEDULED"
    );

    let err = service
        .start_workflow(org, appointment.id, None, &Actor::system())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_failed_status_change_leaves_record_untouched() {
    let (service, store) = service();
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;
    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;
    service
        .start_workflow(org, appointment.id, Some(template_id), &Actor::system())
        .await
        .unwrap();

    store.fail_status_change.store(true, Ordering::SeqCst);
    let err = service
        .apply_transition(org, appointment.id, ids["CONFIRMED"], &Actor::system())
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::Internal);

    assert_eq!(
        service.get_entity(org, appointment.id).await.unwrap().status,
        "SCHEDULED"
    );
    assert_eq!(store.transactions_of_type(AUDIT_TRANSACTION_TYPE).len(), 1);
}

#[tokio::test]
async fn test_records_outside_a_workflow() {
    let (service, _) = service_with(Config {
        strict_workflow_validation: false,
        ..Default::default()
    });
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;
    let customer = create_entity(&service, org, "customer", "Jane").await;

    assert!(service.current_status(org, customer.id).await.unwrap().is_none());
    assert!(service
        .available_transitions(org, customer.id)
        .await
        .unwrap()
        .is_empty());
    let err = service
        .apply_transition(org, customer.id, ids["CONFIRMED"], &Actor::system())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    // A plain entity is not a template
    let err = service.load_workflow(org, customer.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_failed_definition_write_leaves_nothing() {
    print_test_header(
        "test_failed_definition_write_leaves_nothing",
        &["Template, statuses and edges are written together or not at all"],
    );
    let (service, store) = service();
    let org = Uuid::new_v4();

    store.fail_definition.store(true, Ordering::SeqCst);
    let err = service.define_workflow(org, appointment_workflow()).await.unwrap_err();
    assert_eq!(err, CoreError::Internal);
    assert_eq!(store.entity_count(), 0);
    assert_eq!(store.relationship_count(), 0);

    // Nothing half-written blocks the template code on retry
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    assert_eq!(store.entity_count(), 6);
    assert_eq!(store.relationship_count(), 5 + 4);
    assert_eq!(service.load_workflow(org, template_id).await.unwrap().stages().len(), 5);
}

#[tokio::test]
async fn test_malformed_edge_data_fails_closed() {
    print_test_header(
        "test_malformed_edge_data_fails_closed",
        &[
            "Workflow edges with unreadable flags are refused on write",
            "and stop the template from loading instead of reading as no flags",
        ],
    );
    let (service, store) = service();
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;

    let err = service
        .create_relationship(
            org,
            NewRelationship {
                from_entity_id: ids["SCHEDULED"],
                to_entity_id: ids["COMPLETED"],
                relationship_type: CAN_TRANSITION_TO.to_string(),
                relationship_data: json!({ "requires_approval": "true" }),
                smart_code: TRANSITION_SMART_CODE.to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let err = service
        .create_relationship(
            org,
            NewRelationship {
                from_entity_id: template_id,
                to_entity_id: ids["COMPLETED"],
                relationship_type: HAS_STAGE.to_string(),
                relationship_data: json!({ "order": "last" }),
                smart_code: "HERA.WORKFLOW.TEMPLATE.STAGE.LINK.v1".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;
    service
        .start_workflow(org, appointment.id, Some(template_id), &Actor::system())
        .await
        .unwrap();

    // Written past the service, e.g. by an older release
    let now = chrono::Utc::now();
    RelationshipRepository::insert(
        store.as_ref(),
        &Relationship {
            id: Uuid::new_v4(),
            organization_id: org,
            from_entity_id: ids["SCHEDULED"],
            to_entity_id: ids["COMPLETED"],
            relationship_type: CAN_TRANSITION_TO.to_string(),
            relationship_data: json!({ "requires_approval": "yes" }),
            smart_code: TRANSITION_SMART_CODE.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .unwrap();

    let err = service
        .apply_transition(org, appointment.id, ids["COMPLETED"], &Actor::user(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(service.load_workflow(org, template_id).await.is_err());
    assert_eq!(
        service.get_entity(org, appointment.id).await.unwrap().status,
        "SCHEDULED"
    );
}

#[tokio::test]
async fn test_archived_records_keep_their_workflow_status() {
    print_test_header(
        "test_archived_records_keep_their_workflow_status",
        &["Starting or moving an archived record would revive it, so both are refused"],
    );
    let (service, _) = service();
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;

    let started = create_entity(&service, org, "appointment", "Jane 10:00").await;
    service
        .start_workflow(org, started.id, Some(template_id), &Actor::system())
        .await
        .unwrap();
    service
        .delete_entity(org, started.id, CascadeOptions::default())
        .await
        .unwrap();
    let err = service
        .apply_transition(org, started.id, ids["CONFIRMED"], &Actor::system())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(service.get_entity(org, started.id).await.unwrap().is_archived());

    let never_started = create_entity(&service, org, "appointment", "Ann 11:00").await;
    service
        .delete_entity(org, never_started.id, CascadeOptions::default())
        .await
        .unwrap();
    let err = service
        .start_workflow(org, never_started.id, Some(template_id), &Actor::system())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(service
        .get_entity(org, never_started.id)
        .await
        .unwrap()
        .is_archived());
}

#[tokio::test]
async fn test_moves_are_limited_to_the_loaded_template() {
    print_test_header(
        "test_moves_are_limited_to_the_loaded_template",
        &[
            "An edge into another template's status is dropped when loading permissively",
            "so no transition query or move can follow it",
        ],
    );
    let (service, _) = service_with(Config {
        strict_workflow_validation: false,
        ..Default::default()
    });
    let org = Uuid::new_v4();
    let template_id = service.define_workflow(org, appointment_workflow()).await.unwrap();
    let ids = status_ids(&service, org, template_id).await;

    let mut other = appointment_workflow();
    other.template_code = Some("APPOINTMENT_LIFECYCLE_V2".to_string());
    let other_id = service.define_workflow(org, other).await.unwrap();
    let foreign = status_ids(&service, org, other_id).await["COMPLETED"];

    service
        .create_relationship(
            org,
            NewRelationship {
                from_entity_id: ids["SCHEDULED"],
                to_entity_id: foreign,
                relationship_type: CAN_TRANSITION_TO.to_string(),
                relationship_data: json!({}),
                smart_code: TRANSITION_SMART_CODE.to_string(),
            },
        )
        .await
        .unwrap();

    let appointment = create_entity(&service, org, "appointment", "Jane 10:00").await;
    service
        .start_workflow(org, appointment.id, Some(template_id), &Actor::system())
        .await
        .unwrap();

    assert!(!service
        .can_transition(org, ids["SCHEDULED"], foreign)
        .await
        .unwrap());
    let mut available: Vec<String> = service
        .available_transitions(org, appointment.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.status.entity_code)
        .collect();
    available.sort();
    assert_eq!(available, ["CANCELLED", "CONFIRMED"]);

    let err = service
        .apply_transition(org, appointment.id, foreign, &Actor::approver(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::IllegalTransition {
            from: ids["SCHEDULED"],
            to: foreign,
        }
    );

    // A plain entity is not a status of any template
    let customer = create_entity(&service, org, "customer", "Jane").await;
    assert!(!service
        .can_transition(org, customer.id, ids["CONFIRMED"])
        .await
        .unwrap());
}
