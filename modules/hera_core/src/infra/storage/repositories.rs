//! SeaORM repository implementations

use crate::contract::{
    CascadeOptions, DynamicField, Entity, EntityFilter, Page, Relationship, RelationshipFilter,
    Transaction, TransactionFilter, TransactionHeader, TransactionLine, ARCHIVED_STATUS,
};
use crate::domain::repository::{
    DynamicDataRepository, EntityRepository, RelationshipRepository, StatusChange,
    TransactionRepository, WorkflowRecords, WorkflowRepository,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sea_orm::{
    prelude::Expr, sea_query::OnConflict, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::entity::{core_entity, dynamic_data, relationship, transaction, transaction_line};
use super::mapper::entity_update_model;

// ===== Entity Repository =====

pub struct SeaOrmEntityRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmEntityRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityRepository for SeaOrmEntityRepository {
    async fn insert(&self, entity: &Entity) -> Result<Entity> {
        let active: core_entity::ActiveModel = entity.into();
        core_entity::Entity::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(entity.clone())
    }

    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Entity>> {
        let result = core_entity::Entity::find()
            .filter(core_entity::Column::OrganizationId.eq(org))
            .filter(core_entity::Column::Id.eq(id))
            .one(&*self.db)
            .await?;

        Ok(result.map(Into::into))
    }

    async fn find_by_ids(&self, org: Uuid, ids: &[Uuid]) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = core_entity::Entity::find()
            .filter(core_entity::Column::OrganizationId.eq(org))
            .filter(core_entity::Column::Id.is_in(ids.iter().copied()))
            .all(&*self.db)
            .await?;

        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn find_owner(&self, id: Uuid) -> Result<Option<Uuid>> {
        let result = core_entity::Entity::find_by_id(id).one(&*self.db).await?;
        Ok(result.map(|m| m.organization_id))
    }

    async fn find_active_by_code(
        &self,
        org: Uuid,
        entity_type: &str,
        entity_code: &str,
    ) -> Result<Option<Entity>> {
        let result = core_entity::Entity::find()
            .filter(core_entity::Column::OrganizationId.eq(org))
            .filter(core_entity::Column::EntityType.eq(entity_type))
            .filter(core_entity::Column::EntityCode.eq(entity_code))
            .filter(core_entity::Column::Status.ne(ARCHIVED_STATUS))
            .one(&*self.db)
            .await?;

        Ok(result.map(Into::into))
    }

    async fn query(
        &self,
        org: Uuid,
        filter: &EntityFilter,
        page: Page,
    ) -> Result<(Vec<Entity>, u64)> {
        let mut query =
            core_entity::Entity::find().filter(core_entity::Column::OrganizationId.eq(org));

        if let Some(entity_type) = &filter.entity_type {
            query = query.filter(core_entity::Column::EntityType.eq(entity_type.as_str()));
        }
        if let Some(entity_code) = &filter.entity_code {
            query = query.filter(core_entity::Column::EntityCode.eq(entity_code.as_str()));
        }
        if let Some(smart_code) = &filter.smart_code {
            query = query.filter(core_entity::Column::SmartCode.eq(smart_code.as_str()));
        }
        query = match &filter.status {
            Some(status) => query.filter(core_entity::Column::Status.eq(status.as_str())),
            None => query.filter(core_entity::Column::Status.ne(ARCHIVED_STATUS)),
        };

        let total = query.clone().count(&*self.db).await?;
        let results = query
            .order_by_asc(core_entity::Column::CreatedAt)
            .order_by_asc(core_entity::Column::Id)
            .limit(page.limit)
            .offset(page.offset)
            .all(&*self.db)
            .await?;

        Ok((results.into_iter().map(Into::into).collect(), total))
    }

    async fn update(&self, entity: &Entity) -> Result<Entity> {
        let result = core_entity::Entity::update_many()
            .set(entity_update_model(entity))
            .filter(core_entity::Column::OrganizationId.eq(entity.organization_id))
            .filter(core_entity::Column::Id.eq(entity.id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            bail!("entity {} not found for update", entity.id);
        }
        Ok(entity.clone())
    }

    async fn archive(&self, org: Uuid, id: Uuid, cascade: CascadeOptions) -> Result<()> {
        let now = chrono::Utc::now();
        let txn = self.db.begin().await?;

        let result = core_entity::Entity::update_many()
            .col_expr(core_entity::Column::Status, Expr::value(ARCHIVED_STATUS))
            .col_expr(core_entity::Column::UpdatedAt, Expr::value(now))
            .filter(core_entity::Column::OrganizationId.eq(org))
            .filter(core_entity::Column::Id.eq(id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            bail!("entity {} not found for archive", id);
        }

        if cascade.dynamic_data {
            dynamic_data::Entity::update_many()
                .col_expr(dynamic_data::Column::DeletedAt, Expr::value(now))
                .filter(dynamic_data::Column::OrganizationId.eq(org))
                .filter(dynamic_data::Column::EntityId.eq(id))
                .filter(dynamic_data::Column::DeletedAt.is_null())
                .exec(&txn)
                .await?;
        }

        if cascade.relationships {
            relationship::Entity::update_many()
                .col_expr(relationship::Column::IsActive, Expr::value(false))
                .col_expr(relationship::Column::UpdatedAt, Expr::value(now))
                .filter(relationship::Column::OrganizationId.eq(org))
                .filter(
                    Condition::any()
                        .add(relationship::Column::FromEntityId.eq(id))
                        .add(relationship::Column::ToEntityId.eq(id)),
                )
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

// ===== Dynamic Data Repository =====

pub struct SeaOrmDynamicDataRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmDynamicDataRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DynamicDataRepository for SeaOrmDynamicDataRepository {
    async fn upsert(&self, field: &DynamicField) -> Result<DynamicField> {
        use dynamic_data::Column;

        // Concurrent writers of the same key both land here; the later one replaces
        // the row, keeping its id and created_at, and revives it if soft deleted.
        let active = dynamic_data::ActiveModel::try_from(field)?;
        dynamic_data::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([Column::EntityId, Column::FieldName])
                    .update_columns([
                        Column::FieldType,
                        Column::FieldValueText,
                        Column::FieldValueNumber,
                        Column::FieldValueBoolean,
                        Column::FieldValueDate,
                        Column::FieldValueJson,
                        Column::SmartCode,
                        Column::ValidationRules,
                        Column::IsRequired,
                        Column::FieldOrder,
                        Column::UpdatedAt,
                        Column::DeletedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        let stored = dynamic_data::Entity::find()
            .filter(Column::OrganizationId.eq(field.organization_id))
            .filter(Column::EntityId.eq(field.entity_id))
            .filter(Column::FieldName.eq(field.field_name.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("field {} vanished after upsert", field.field_name))?;

        DynamicField::try_from(stored)
    }

    async fn clear(&self, org: Uuid, entity_id: Uuid, field_name: &str) -> Result<bool> {
        let result = dynamic_data::Entity::update_many()
            .col_expr(dynamic_data::Column::DeletedAt, Expr::value(chrono::Utc::now()))
            .filter(dynamic_data::Column::OrganizationId.eq(org))
            .filter(dynamic_data::Column::EntityId.eq(entity_id))
            .filter(dynamic_data::Column::FieldName.eq(field_name))
            .filter(dynamic_data::Column::DeletedAt.is_null())
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn find_for_entities(&self, org: Uuid, entity_ids: &[Uuid]) -> Result<Vec<DynamicField>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = dynamic_data::Entity::find()
            .filter(dynamic_data::Column::OrganizationId.eq(org))
            .filter(dynamic_data::Column::EntityId.is_in(entity_ids.iter().copied()))
            .filter(dynamic_data::Column::DeletedAt.is_null())
            .order_by_asc(dynamic_data::Column::EntityId)
            .order_by_asc(dynamic_data::Column::FieldOrder)
            .order_by_asc(dynamic_data::Column::FieldName)
            .all(&*self.db)
            .await?;

        results
            .into_iter()
            .map(DynamicField::try_from)
            .collect::<Result<Vec<_>>>()
    }
}

// ===== Relationship Repository =====

pub struct SeaOrmRelationshipRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmRelationshipRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationshipRepository for SeaOrmRelationshipRepository {
    async fn insert(&self, rel: &Relationship) -> Result<Relationship> {
        let active: relationship::ActiveModel = rel.into();
        relationship::Entity::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(rel.clone())
    }

    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Relationship>> {
        let result = relationship::Entity::find()
            .filter(relationship::Column::OrganizationId.eq(org))
            .filter(relationship::Column::Id.eq(id))
            .one(&*self.db)
            .await?;

        Ok(result.map(Into::into))
    }

    async fn query(&self, org: Uuid, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let mut query =
            relationship::Entity::find().filter(relationship::Column::OrganizationId.eq(org));

        if let Some(from) = filter.from_entity_id {
            query = query.filter(relationship::Column::FromEntityId.eq(from));
        }
        if let Some(to) = filter.to_entity_id {
            query = query.filter(relationship::Column::ToEntityId.eq(to));
        }
        if let Some(rel_type) = &filter.relationship_type {
            query = query.filter(relationship::Column::RelationshipType.eq(rel_type.as_str()));
        }
        if !filter.include_inactive {
            query = query.filter(relationship::Column::IsActive.eq(true));
        }

        let results = query
            .order_by_asc(relationship::Column::CreatedAt)
            .order_by_asc(relationship::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn find_from_entities(
        &self,
        org: Uuid,
        from_ids: &[Uuid],
        relationship_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        if from_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = relationship::Entity::find()
            .filter(relationship::Column::OrganizationId.eq(org))
            .filter(relationship::Column::FromEntityId.is_in(from_ids.iter().copied()))
            .filter(relationship::Column::IsActive.eq(true));

        if let Some(rel_type) = relationship_type {
            query = query.filter(relationship::Column::RelationshipType.eq(rel_type));
        }

        let results = query
            .order_by_asc(relationship::Column::FromEntityId)
            .order_by_asc(relationship::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn deactivate(&self, org: Uuid, id: Uuid) -> Result<()> {
        relationship::Entity::update_many()
            .col_expr(relationship::Column::IsActive, Expr::value(false))
            .col_expr(relationship::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(relationship::Column::OrganizationId.eq(org))
            .filter(relationship::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;

        Ok(())
    }
}

// ===== Transaction Repository =====

pub struct SeaOrmTransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn insert(&self, txn_record: &Transaction) -> Result<Transaction> {
        let txn = self.db.begin().await?;

        let header: transaction::ActiveModel = (&txn_record.header).into();
        transaction::Entity::insert(header)
            .exec_without_returning(&txn)
            .await?;

        if !txn_record.lines.is_empty() {
            let lines: Vec<transaction_line::ActiveModel> =
                txn_record.lines.iter().map(Into::into).collect();
            transaction_line::Entity::insert_many(lines)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(txn_record.clone())
    }

    async fn find_by_id(&self, org: Uuid, id: Uuid) -> Result<Option<Transaction>> {
        let Some(header) = transaction::Entity::find()
            .filter(transaction::Column::OrganizationId.eq(org))
            .filter(transaction::Column::Id.eq(id))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let lines = transaction_line::Entity::find()
            .filter(transaction_line::Column::OrganizationId.eq(org))
            .filter(transaction_line::Column::TransactionId.eq(id))
            .order_by_asc(transaction_line::Column::LineNumber)
            .all(&*self.db)
            .await?;

        Ok(Some(Transaction {
            header: header.into(),
            lines: lines.into_iter().map(TransactionLine::from).collect(),
        }))
    }

    async fn query(
        &self,
        org: Uuid,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<(Vec<TransactionHeader>, u64)> {
        let mut query =
            transaction::Entity::find().filter(transaction::Column::OrganizationId.eq(org));

        if let Some(transaction_type) = &filter.transaction_type {
            query = query.filter(transaction::Column::TransactionType.eq(transaction_type.as_str()));
        }
        if let Some(smart_code) = &filter.smart_code {
            query = query.filter(transaction::Column::SmartCode.eq(smart_code.as_str()));
        }
        if let Some(status) = &filter.status {
            query = query.filter(transaction::Column::Status.eq(status.as_str()));
        }
        if let Some(source) = filter.source_entity_id {
            query = query.filter(transaction::Column::SourceEntityId.eq(source));
        }
        if let Some(target) = filter.target_entity_id {
            query = query.filter(transaction::Column::TargetEntityId.eq(target));
        }

        let total = query.clone().count(&*self.db).await?;
        let results = query
            .order_by_asc(transaction::Column::TransactionDate)
            .order_by_asc(transaction::Column::Id)
            .limit(page.limit)
            .offset(page.offset)
            .all(&*self.db)
            .await?;

        Ok((results.into_iter().map(Into::into).collect(), total))
    }

    async fn update_status(
        &self,
        org: Uuid,
        id: Uuid,
        status: &str,
    ) -> Result<Option<TransactionHeader>> {
        let result = transaction::Entity::update_many()
            .col_expr(transaction::Column::Status, Expr::value(status))
            .col_expr(transaction::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(transaction::Column::OrganizationId.eq(org))
            .filter(transaction::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        let header = transaction::Entity::find_by_id(id).one(&*self.db).await?;
        Ok(header.map(Into::into))
    }
}

// ===== Workflow Repository =====

pub struct SeaOrmWorkflowRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmWorkflowRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkflowRepository for SeaOrmWorkflowRepository {
    async fn insert_definition(&self, records: &WorkflowRecords) -> Result<()> {
        let txn = self.db.begin().await?;

        let template: core_entity::ActiveModel = (&records.template).into();
        core_entity::Entity::insert(template)
            .exec_without_returning(&txn)
            .await?;

        // Statuses first; edges reference them
        if !records.statuses.is_empty() {
            let statuses: Vec<core_entity::ActiveModel> =
                records.statuses.iter().map(Into::into).collect();
            core_entity::Entity::insert_many(statuses)
                .exec_without_returning(&txn)
                .await?;
        }
        if !records.edges.is_empty() {
            let edges: Vec<relationship::ActiveModel> =
                records.edges.iter().map(Into::into).collect();
            relationship::Entity::insert_many(edges)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn apply_status_change(&self, change: &StatusChange) -> Result<()> {
        let now = chrono::Utc::now();
        let txn = self.db.begin().await?;

        if change.previous_link.is_none() {
            let active_links = relationship::Entity::find()
                .filter(relationship::Column::OrganizationId.eq(change.organization_id))
                .filter(relationship::Column::FromEntityId.eq(change.record_id))
                .filter(
                    relationship::Column::RelationshipType
                        .eq(change.new_link.relationship_type.as_str()),
                )
                .filter(relationship::Column::IsActive.eq(true))
                .count(&txn)
                .await?;
            if active_links > 0 {
                bail!("record {} already has an active status link", change.record_id);
            }
        }

        if let Some(previous) = change.previous_link {
            let result = relationship::Entity::update_many()
                .col_expr(relationship::Column::IsActive, Expr::value(false))
                .col_expr(relationship::Column::UpdatedAt, Expr::value(now))
                .filter(relationship::Column::OrganizationId.eq(change.organization_id))
                .filter(relationship::Column::Id.eq(previous))
                .filter(relationship::Column::IsActive.eq(true))
                .exec(&txn)
                .await?;
            // Another writer moved the record first
            if result.rows_affected != 1 {
                bail!("status link {} is no longer active", previous);
            }
        }

        let link: relationship::ActiveModel = (&change.new_link).into();
        relationship::Entity::insert(link)
            .exec_without_returning(&txn)
            .await?;

        let result = core_entity::Entity::update_many()
            .col_expr(core_entity::Column::Status, Expr::value(change.record_status.as_str()))
            .col_expr(core_entity::Column::UpdatedAt, Expr::value(now))
            .filter(core_entity::Column::OrganizationId.eq(change.organization_id))
            .filter(core_entity::Column::Id.eq(change.record_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            bail!("record {} not found for status change", change.record_id);
        }

        let audit: transaction::ActiveModel = (&change.audit).into();
        transaction::Entity::insert(audit)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }
}
