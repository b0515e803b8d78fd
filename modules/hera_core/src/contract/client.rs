//! Native client trait for inter-module communication
//!
//! This trait defines the API that route handlers, seeders and other modules use
//! to interact with the HERA core. Direct function calls, no transport.
//! Every operation takes the caller's organization as its first argument.

use super::error::CoreError;
use super::model::*;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// HERA core API for inter-module communication
#[async_trait]
pub trait BusinessDataApi: Send + Sync {
    // ===== Entity Operations =====

    /// Create an entity, generating its code when absent
    async fn create_entity(&self, org: Uuid, entity: NewEntity) -> Result<Entity, CoreError>;

    /// Get one entity by id
    async fn get_entity(&self, org: Uuid, id: Uuid) -> Result<Entity, CoreError>;

    /// Filter entities with paging and optional hydration
    async fn read_entities(
        &self,
        org: Uuid,
        filter: EntityFilter,
        include: EntityInclude,
        page: Page,
    ) -> Result<PageResult<EntityRecord>, CoreError>;

    /// Apply a partial update
    async fn update_entity(
        &self,
        org: Uuid,
        id: Uuid,
        patch: EntityPatch,
    ) -> Result<Entity, CoreError>;

    /// Archive an entity (soft delete)
    async fn delete_entity(
        &self,
        org: Uuid,
        id: Uuid,
        cascade: CascadeOptions,
    ) -> Result<(), CoreError>;

    // ===== Dynamic Field Operations =====

    /// Validate and write one field; `None` when the write cleared the field
    async fn set_field(
        &self,
        org: Uuid,
        entity_id: Uuid,
        field: FieldWrite,
    ) -> Result<Option<DynamicField>, CoreError>;

    /// Read fields of many entities at once
    async fn read_fields_batch(
        &self,
        org: Uuid,
        entity_ids: &HashSet<Uuid>,
    ) -> Result<HashMap<Uuid, BTreeMap<String, TypedValue>>, CoreError>;

    // ===== Relationship Operations =====

    /// Link two entities of the organization
    async fn create_relationship(
        &self,
        org: Uuid,
        relationship: NewRelationship,
    ) -> Result<Relationship, CoreError>;

    /// Query edges by endpoint and type
    async fn query_relationships(
        &self,
        org: Uuid,
        filter: RelationshipFilter,
    ) -> Result<Vec<Relationship>, CoreError>;

    // ===== Transaction Operations =====

    /// Record a transaction header with its lines
    async fn create_transaction(
        &self,
        org: Uuid,
        transaction: NewTransaction,
    ) -> Result<Transaction, CoreError>;

    /// Get a transaction with its lines
    async fn get_transaction(&self, org: Uuid, id: Uuid) -> Result<Transaction, CoreError>;

    // ===== Workflow Operations =====

    /// Write a workflow template; returns the template entity id
    async fn define_workflow(
        &self,
        org: Uuid,
        definition: WorkflowDefinition,
    ) -> Result<Uuid, CoreError>;

    /// Whether a `can_transition_to` edge exists between two statuses
    async fn can_transition(
        &self,
        org: Uuid,
        current_status_id: Uuid,
        target_status_id: Uuid,
    ) -> Result<bool, CoreError>;

    /// Place a record in the initial stage of a workflow
    async fn start_workflow(
        &self,
        org: Uuid,
        record_id: Uuid,
        template_id: Option<Uuid>,
        actor: &Actor,
    ) -> Result<TransactionHeader, CoreError>;

    /// Move a record to another status; returns the audit entry
    async fn apply_transition(
        &self,
        org: Uuid,
        record_id: Uuid,
        target_status_id: Uuid,
        actor: &Actor,
    ) -> Result<TransactionHeader, CoreError>;
}
