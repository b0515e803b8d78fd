//! Repository traits for data access
//!
//! These traits define the interface for data access operations.
//! Implementations are in infra/storage/repositories.rs.
//! The organization id is the first argument of every scoped call.

use crate::contract::{
    CascadeOptions, DynamicField, Entity, EntityFilter, Page, Relationship, RelationshipFilter,
    Transaction, TransactionFilter, TransactionHeader,
};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for `core_entities`
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Insert a new entity
    async fn insert(&self, entity: &Entity) -> Result<Entity>;

    /// Find an entity of the organization by id
    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Entity>>;

    /// Find many entities of the organization by id
    async fn find_by_ids(&self, org: Uuid, ids: &[Uuid]) -> Result<Vec<Entity>>;

    /// Organization owning an entity, regardless of the caller's organization.
    /// Used only to tell "missing" apart from "belongs to another tenant".
    async fn find_owner(&self, id: Uuid) -> Result<Option<Uuid>>;

    /// Non-archived entity with the given type and code
    async fn find_active_by_code(
        &self,
        org: Uuid,
        entity_type: &str,
        entity_code: &str,
    ) -> Result<Option<Entity>>;

    /// Filtered page plus total number of matches
    async fn query(&self, org: Uuid, filter: &EntityFilter, page: Page)
        -> Result<(Vec<Entity>, u64)>;

    /// Persist changed columns of an existing entity
    async fn update(&self, entity: &Entity) -> Result<Entity>;

    /// Set status to archived, cascading in the same store transaction
    async fn archive(&self, org: Uuid, id: Uuid, cascade: CascadeOptions) -> Result<()>;
}

/// Repository for `core_dynamic_data`
#[async_trait]
pub trait DynamicDataRepository: Send + Sync {
    /// Insert or replace the row keyed by `(entity_id, field_name)`
    async fn upsert(&self, field: &DynamicField) -> Result<DynamicField>;

    /// Soft delete one field; returns whether a live row existed
    async fn clear(&self, org: Uuid, entity_id: Uuid, field_name: &str) -> Result<bool>;

    /// Live rows for a bounded set of entities, ordered by entity then field order
    async fn find_for_entities(&self, org: Uuid, entity_ids: &[Uuid]) -> Result<Vec<DynamicField>>;
}

/// Repository for `core_relationships`
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Insert a new edge
    async fn insert(&self, relationship: &Relationship) -> Result<Relationship>;

    /// Find one edge of the organization
    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Relationship>>;

    /// Edges matching the filter
    async fn query(&self, org: Uuid, filter: &RelationshipFilter) -> Result<Vec<Relationship>>;

    /// Active edges leaving any of the given entities
    async fn find_from_entities(
        &self,
        org: Uuid,
        from_ids: &[Uuid],
        relationship_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    /// Mark an edge inactive
    async fn deactivate(&self, org: Uuid, id: Uuid) -> Result<()>;
}

/// Repository for `universal_transactions` and their lines
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert header and lines in one store transaction
    async fn insert(&self, transaction: &Transaction) -> Result<Transaction>;

    /// Header and lines by id
    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Transaction>>;

    /// Filtered page of headers plus total number of matches
    async fn query(
        &self,
        org: Uuid,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<(Vec<TransactionHeader>, u64)>;

    /// Change the status of a header
    async fn update_status(&self, org: Uuid, id: Uuid, status: &str)
        -> Result<Option<TransactionHeader>>;
}

/// Everything a workflow status change writes
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub organization_id: Uuid,
    pub record_id: Uuid,
    /// Current `has_workflow_status` edge, deactivated by the change
    pub previous_link: Option<Uuid>,
    /// New `has_workflow_status` edge
    pub new_link: Relationship,
    /// Value mirrored into the record's `status` column
    pub record_status: String,
    /// Audit entry appended to the ledger
    pub audit: TransactionHeader,
}

/// Template entity, status entities and their edges written by `define_workflow`
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRecords {
    pub template: Entity,
    pub statuses: Vec<Entity>,
    /// `has_stage` and `can_transition_to` edges
    pub edges: Vec<Relationship>,
}

/// Multi-row workflow writes that must land together
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Insert a whole template in one store transaction, or nothing
    async fn insert_definition(&self, records: &WorkflowRecords) -> Result<()>;

    /// Apply all parts of the change in one store transaction, or none of them.
    ///
    /// Without a previous link the change fails if the record already has an
    /// active status link.
    async fn apply_status_change(&self, change: &StatusChange) -> Result<()>;
}
