//! Common test utilities: in-memory repositories and fixtures

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use hera_core::config::Config;
use hera_core::contract::*;
use hera_core::domain::repository::{
    DynamicDataRepository, EntityRepository, RelationshipRepository, StatusChange,
    TransactionRepository, WorkflowRecords, WorkflowRepository,
};
use hera_core::domain::Service;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

#[derive(Default)]
struct State {
    entities: Vec<Entity>,
    /// (field, deleted)
    fields: Vec<(DynamicField, bool)>,
    relationships: Vec<Relationship>,
    transactions: Vec<Transaction>,
}

/// One in-memory store standing in for every repository
#[derive(Default)]
pub struct MockStore {
    state: RwLock<State>,
    /// Number of `find_for_entities` calls
    pub field_lookups: AtomicUsize,
    /// Id counts passed to each `find_for_entities` call
    pub field_lookup_sizes: RwLock<Vec<usize>>,
    /// Make the next status change fail without writing anything
    pub fail_status_change: AtomicBool,
    /// Make the next workflow definition write fail without writing anything
    pub fail_definition: AtomicBool,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entity_count(&self) -> usize {
        self.state.read().entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.read().relationships.len()
    }

    pub fn live_field_count(&self, entity_id: Uuid) -> usize {
        self.state
            .read()
            .fields
            .iter()
            .filter(|(f, deleted)| f.entity_id == entity_id && !deleted)
            .count()
    }

    pub fn stored_field_rows(&self, entity_id: Uuid) -> usize {
        self.state
            .read()
            .fields
            .iter()
            .filter(|(f, _)| f.entity_id == entity_id)
            .count()
    }

    pub fn transactions_of_type(&self, transaction_type: &str) -> Vec<TransactionHeader> {
        self.state
            .read()
            .transactions
            .iter()
            .filter(|t| t.header.transaction_type == transaction_type)
            .map(|t| t.header.clone())
            .collect()
    }

    pub fn print_state(&self, context: &str) {
        let state = self.state.read();
        println!("\n========== MockStore State: {} ==========", context);
        println!("Entities: {}", state.entities.len());
        for e in &state.entities {
            println!("  {} [{}] {} ({}) status={}", e.id, e.entity_type, e.entity_name, e.entity_code, e.status);
        }
        println!("Relationships: {}", state.relationships.len());
        for r in &state.relationships {
            println!(
                "  {} -[{}{}]-> {}",
                r.from_entity_id,
                r.relationship_type,
                if r.is_active { "" } else { ", inactive" },
                r.to_entity_id
            );
        }
        println!("Transactions: {}", state.transactions.len());
        println!("==========================================\n");
    }
}

#[async_trait]
impl EntityRepository for MockStore {
    async fn insert(&self, entity: &Entity) -> Result<Entity> {
        self.state.write().entities.push(entity.clone());
        Ok(entity.clone())
    }

    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Entity>> {
        Ok(self
            .state
            .read()
            .entities
            .iter()
            .find(|e| e.organization_id == org && e.id == id)
            .cloned())
    }

    async fn find_by_ids(&self, org: Uuid, ids: &[Uuid]) -> Result<Vec<Entity>> {
        Ok(self
            .state
            .read()
            .entities
            .iter()
            .filter(|e| e.organization_id == org && ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn find_owner(&self, id: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .state
            .read()
            .entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.organization_id))
    }

    async fn find_active_by_code(
        &self,
        org: Uuid,
        entity_type: &str,
        entity_code: &str,
    ) -> Result<Option<Entity>> {
        Ok(self
            .state
            .read()
            .entities
            .iter()
            .find(|e| {
                e.organization_id == org
                    && e.entity_type == entity_type
                    && e.entity_code == entity_code
                    && !e.is_archived()
            })
            .cloned())
    }

    async fn query(&self, org: Uuid, filter: &EntityFilter, page: Page) -> Result<(Vec<Entity>, u64)> {
        let state = self.state.read();
        let matching: Vec<&Entity> = state
            .entities
            .iter()
            .filter(|e| e.organization_id == org)
            .filter(|e| filter.entity_type.as_ref().map_or(true, |t| &e.entity_type == t))
            .filter(|e| filter.entity_code.as_ref().map_or(true, |c| &e.entity_code == c))
            .filter(|e| filter.smart_code.as_ref().map_or(true, |c| &e.smart_code == c))
            .filter(|e| match &filter.status {
                Some(status) => &e.status == status,
                None => !e.is_archived(),
            })
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn update(&self, entity: &Entity) -> Result<Entity> {
        let mut state = self.state.write();
        let Some(existing) = state
            .entities
            .iter_mut()
            .find(|e| e.organization_id == entity.organization_id && e.id == entity.id)
        else {
            bail!("entity {} not found for update", entity.id);
        };
        *existing = entity.clone();
        Ok(entity.clone())
    }

    async fn archive(&self, org: Uuid, id: Uuid, cascade: CascadeOptions) -> Result<()> {
        let mut state = self.state.write();
        let Some(entity) = state
            .entities
            .iter_mut()
            .find(|e| e.organization_id == org && e.id == id)
        else {
            bail!("entity {} not found for archive", id);
        };
        entity.status = ARCHIVED_STATUS.to_string();
        if cascade.dynamic_data {
            for (field, deleted) in state.fields.iter_mut() {
                if field.entity_id == id {
                    *deleted = true;
                }
            }
        }
        if cascade.relationships {
            for rel in state.relationships.iter_mut() {
                if rel.organization_id == org && (rel.from_entity_id == id || rel.to_entity_id == id) {
                    rel.is_active = false;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DynamicDataRepository for MockStore {
    async fn upsert(&self, field: &DynamicField) -> Result<DynamicField> {
        let mut state = self.state.write();
        let existing = state
            .fields
            .iter_mut()
            .find(|(f, _)| f.entity_id == field.entity_id && f.field_name == field.field_name);
        match existing {
            Some((stored, deleted)) => {
                *stored = DynamicField {
                    id: stored.id,
                    created_at: stored.created_at,
                    ..field.clone()
                };
                *deleted = false;
                Ok(stored.clone())
            }
            None => {
                state.fields.push((field.clone(), false));
                Ok(field.clone())
            }
        }
    }

    async fn clear(&self, org: Uuid, entity_id: Uuid, field_name: &str) -> Result<bool> {
        let mut state = self.state.write();
        for (field, deleted) in state.fields.iter_mut() {
            if field.organization_id == org
                && field.entity_id == entity_id
                && field.field_name == field_name
                && !*deleted
            {
                *deleted = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn find_for_entities(&self, org: Uuid, entity_ids: &[Uuid]) -> Result<Vec<DynamicField>> {
        self.field_lookups.fetch_add(1, Ordering::SeqCst);
        self.field_lookup_sizes.write().push(entity_ids.len());
        Ok(self
            .state
            .read()
            .fields
            .iter()
            .filter(|(f, deleted)| {
                !deleted && f.organization_id == org && entity_ids.contains(&f.entity_id)
            })
            .map(|(f, _)| f.clone())
            .collect())
    }
}

#[async_trait]
impl RelationshipRepository for MockStore {
    async fn insert(&self, relationship: &Relationship) -> Result<Relationship> {
        self.state.write().relationships.push(relationship.clone());
        Ok(relationship.clone())
    }

    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Relationship>> {
        Ok(self
            .state
            .read()
            .relationships
            .iter()
            .find(|r| r.organization_id == org && r.id == id)
            .cloned())
    }

    async fn query(&self, org: Uuid, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        Ok(self
            .state
            .read()
            .relationships
            .iter()
            .filter(|r| r.organization_id == org)
            .filter(|r| filter.from_entity_id.map_or(true, |id| r.from_entity_id == id))
            .filter(|r| filter.to_entity_id.map_or(true, |id| r.to_entity_id == id))
            .filter(|r| {
                filter
                    .relationship_type
                    .as_ref()
                    .map_or(true, |t| &r.relationship_type == t)
            })
            .filter(|r| filter.include_inactive || r.is_active)
            .cloned()
            .collect())
    }

    async fn find_from_entities(
        &self,
        org: Uuid,
        from_ids: &[Uuid],
        relationship_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        Ok(self
            .state
            .read()
            .relationships
            .iter()
            .filter(|r| r.organization_id == org && r.is_active && from_ids.contains(&r.from_entity_id))
            .filter(|r| relationship_type.map_or(true, |t| r.relationship_type == t))
            .cloned()
            .collect())
    }

    async fn deactivate(&self, org: Uuid, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        if let Some(rel) = state
            .relationships
            .iter_mut()
            .find(|r| r.organization_id == org && r.id == id)
        {
            rel.is_active = false;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for MockStore {
    async fn insert(&self, transaction: &Transaction) -> Result<Transaction> {
        self.state.write().transactions.push(transaction.clone());
        Ok(transaction.clone())
    }

    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Transaction>> {
        Ok(self
            .state
            .read()
            .transactions
            .iter()
            .find(|t| t.header.organization_id == org && t.header.id == id)
            .cloned())
    }

    async fn query(
        &self,
        org: Uuid,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<(Vec<TransactionHeader>, u64)> {
        let state = self.state.read();
        let matching: Vec<&TransactionHeader> = state
            .transactions
            .iter()
            .map(|t| &t.header)
            .filter(|h| h.organization_id == org)
            .filter(|h| {
                filter
                    .transaction_type
                    .as_ref()
                    .map_or(true, |t| &h.transaction_type == t)
            })
            .filter(|h| filter.status.as_ref().map_or(true, |s| &h.status == s))
            .filter(|h| filter.smart_code.as_ref().map_or(true, |c| &h.smart_code == c))
            .filter(|h| filter.source_entity_id.map_or(true, |id| h.source_entity_id == Some(id)))
            .filter(|h| filter.target_entity_id.map_or(true, |id| h.target_entity_id == Some(id)))
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn update_status(
        &self,
        org: Uuid,
        id: Uuid,
        status: &str,
    ) -> Result<Option<TransactionHeader>> {
        let mut state = self.state.write();
        Ok(state
            .transactions
            .iter_mut()
            .find(|t| t.header.organization_id == org && t.header.id == id)
            .map(|t| {
                t.header.status = status.to_string();
                t.header.clone()
            }))
    }
}

#[async_trait]
impl WorkflowRepository for MockStore {
    async fn insert_definition(&self, records: &WorkflowRecords) -> Result<()> {
        if self.fail_definition.swap(false, Ordering::SeqCst) {
            bail!("injected definition failure");
        }

        let mut state = self.state.write();
        state.entities.push(records.template.clone());
        state.entities.extend(records.statuses.iter().cloned());
        state.relationships.extend(records.edges.iter().cloned());
        Ok(())
    }

    async fn apply_status_change(&self, change: &StatusChange) -> Result<()> {
        if self.fail_status_change.swap(false, Ordering::SeqCst) {
            bail!("injected status change failure");
        }

        let mut state = self.state.write();
        // Check everything first so a failure leaves no partial write
        if let Some(previous) = change.previous_link {
            let active = state
                .relationships
                .iter()
                .any(|r| r.id == previous && r.is_active);
            if !active {
                bail!("status link {} is no longer active", previous);
            }
        } else if state.relationships.iter().any(|r| {
            r.from_entity_id == change.record_id
                && r.relationship_type == change.new_link.relationship_type
                && r.is_active
        }) {
            bail!("record {} already has an active status link", change.record_id);
        }
        if !state
            .entities
            .iter()
            .any(|e| e.organization_id == change.organization_id && e.id == change.record_id)
        {
            bail!("record {} not found", change.record_id);
        }

        if let Some(previous) = change.previous_link {
            for rel in state.relationships.iter_mut().filter(|r| r.id == previous) {
                rel.is_active = false;
            }
        }
        state.relationships.push(change.new_link.clone());
        for entity in state.entities.iter_mut().filter(|e| e.id == change.record_id) {
            entity.status = change.record_status.clone();
        }
        state.transactions.push(Transaction {
            header: change.audit.clone(),
            lines: Vec::new(),
        });
        Ok(())
    }
}

/// Service over a fresh mock store
pub fn service_with(config: Config) -> (Arc<Service>, Arc<MockStore>) {
    let store = MockStore::new();
    let service = Service::new(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    )
    .expect("valid config");
    (Arc::new(service), store)
}

pub fn service() -> (Arc<Service>, Arc<MockStore>) {
    service_with(Config::default())
}

/// Entity with a generated code and a salon smart code
pub async fn create_entity(service: &Service, org: Uuid, entity_type: &str, name: &str) -> Entity {
    service
        .create_entity(
            org,
            NewEntity {
                entity_type: entity_type.to_string(),
                entity_name: name.to_string(),
                smart_code: format!("HERA.SALON.{}.ENTITY.STD.v1", entity_type.to_uppercase()),
                ..Default::default()
            },
        )
        .await
        .expect("create entity")
}

/// Appointment lifecycle: SCHEDULED -> CONFIRMED -> CHECKED_IN -> COMPLETED,
/// with an approval-gated SCHEDULED -> CANCELLED
pub fn appointment_workflow() -> WorkflowDefinition {
    let stage = |code: &str, order: i32, is_initial: bool, is_final: bool| StageDefinition {
        code: code.to_string(),
        name: code.replace('_', " ").to_lowercase(),
        flags: StageFlags {
            order,
            is_initial,
            is_final,
        },
    };
    let transition = |from: &str, to: &str, requires_approval: bool| TransitionDefinition {
        from: from.to_string(),
        to: to.to_string(),
        flags: TransitionFlags {
            requires_approval,
            ..Default::default()
        },
    };

    WorkflowDefinition {
        template_name: "Appointment lifecycle".to_string(),
        template_code: Some("APPOINTMENT_LIFECYCLE".to_string()),
        smart_code: "HERA.SALON.WORKFLOW.TEMPLATE.APPOINTMENT.v1".to_string(),
        stages: vec![
            stage("SCHEDULED", 1, true, false),
            stage("CONFIRMED", 2, false, false),
            stage("CHECKED_IN", 3, false, false),
            stage("COMPLETED", 4, false, true),
            stage("CANCELLED", 9, false, true),
        ],
        transitions: vec![
            transition("SCHEDULED", "CONFIRMED", false),
            transition("CONFIRMED", "CHECKED_IN", false),
            transition("CHECKED_IN", "COMPLETED", false),
            transition("SCHEDULED", "CANCELLED", true),
        ],
    }
}
