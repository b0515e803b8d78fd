//! Native client implementation - wraps domain service for in-process calls

use crate::contract::*;
use crate::domain::Service;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Native client implementation that directly calls the domain service
///
/// Used by in-process callers (route handlers, seeders, other modules)
/// without any transport in between.
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    /// Create a new native client
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl BusinessDataApi for NativeClient {
    async fn create_entity(&self, org: Uuid, entity: NewEntity) -> Result<Entity, CoreError> {
        self.service.create_entity(org, entity).await
    }

    async fn get_entity(&self, org: Uuid, id: Uuid) -> Result<Entity, CoreError> {
        self.service.get_entity(org, id).await
    }

    async fn read_entities(
        &self,
        org: Uuid,
        filter: EntityFilter,
        include: EntityInclude,
        page: Page,
    ) -> Result<PageResult<EntityRecord>, CoreError> {
        self.service.read_entities(org, filter, include, page).await
    }

    async fn update_entity(
        &self,
        org: Uuid,
        id: Uuid,
        patch: EntityPatch,
    ) -> Result<Entity, CoreError> {
        self.service.update_entity(org, id, patch).await
    }

    async fn delete_entity(
        &self,
        org: Uuid,
        id: Uuid,
        cascade: CascadeOptions,
    ) -> Result<(), CoreError> {
        self.service.delete_entity(org, id, cascade).await
    }

    async fn set_field(
        &self,
        org: Uuid,
        entity_id: Uuid,
        field: FieldWrite,
    ) -> Result<Option<DynamicField>, CoreError> {
        self.service.set_field(org, entity_id, field).await
    }

    async fn read_fields_batch(
        &self,
        org: Uuid,
        entity_ids: &HashSet<Uuid>,
    ) -> Result<HashMap<Uuid, BTreeMap<String, TypedValue>>, CoreError> {
        self.service.read_fields_batch(org, entity_ids).await
    }

    async fn create_relationship(
        &self,
        org: Uuid,
        relationship: NewRelationship,
    ) -> Result<Relationship, CoreError> {
        self.service.create_relationship(org, relationship).await
    }

    async fn query_relationships(
        &self,
        org: Uuid,
        filter: RelationshipFilter,
    ) -> Result<Vec<Relationship>, CoreError> {
        self.service.query_relationships(org, filter).await
    }

    async fn create_transaction(
        &self,
        org: Uuid,
        transaction: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        self.service.create_transaction(org, transaction).await
    }

    async fn get_transaction(&self, org: Uuid, id: Uuid) -> Result<Transaction, CoreError> {
        self.service.get_transaction(org, id).await
    }

    async fn define_workflow(
        &self,
        org: Uuid,
        definition: WorkflowDefinition,
    ) -> Result<Uuid, CoreError> {
        self.service.define_workflow(org, definition).await
    }

    async fn can_transition(
        &self,
        org: Uuid,
        current_status_id: Uuid,
        target_status_id: Uuid,
    ) -> Result<bool, CoreError> {
        self.service
            .can_transition(org, current_status_id, target_status_id)
            .await
    }

    async fn start_workflow(
        &self,
        org: Uuid,
        record_id: Uuid,
        template_id: Option<Uuid>,
        actor: &Actor,
    ) -> Result<TransactionHeader, CoreError> {
        self.service
            .start_workflow(org, record_id, template_id, actor)
            .await
    }

    async fn apply_transition(
        &self,
        org: Uuid,
        record_id: Uuid,
        target_status_id: Uuid,
        actor: &Actor,
    ) -> Result<TransactionHeader, CoreError> {
        self.service
            .apply_transition(org, record_id, target_status_id, actor)
            .await
    }
}
