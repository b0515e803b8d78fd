//! Entity store operations

use super::{generate_code, internal, parse_smart_code, require_non_empty, Service};
use crate::contract::{
    CascadeOptions, CoreError, Entity, EntityFilter, EntityInclude, EntityPatch, EntityRecord,
    NewEntity, Page, PageResult, ACTIVE_STATUS, ARCHIVED_STATUS,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

impl Service {
    /// Create an entity, generating its code when absent
    pub async fn create_entity(&self, org: Uuid, new: NewEntity) -> Result<Entity, CoreError> {
        let entity = self.prepare_entity(org, new).await?;
        let created = self
            .entity_repo
            .insert(&entity)
            .await
            .map_err(internal("insert entity"))?;

        tracing::info!(
            %org,
            entity_id = %created.id,
            entity_type = %created.entity_type,
            entity_code = %created.entity_code,
            "created entity"
        );
        Ok(created)
    }

    /// Validated entity row, not yet written
    pub(super) async fn prepare_entity(
        &self,
        org: Uuid,
        new: NewEntity,
    ) -> Result<Entity, CoreError> {
        require_non_empty(&new.entity_type, "entity_type")?;
        require_non_empty(&new.entity_name, "entity_name")?;
        parse_smart_code(&new.smart_code)?;

        let entity_code = match new.entity_code {
            Some(code) => {
                require_non_empty(&code, "entity_code")?;
                self.ensure_code_available(org, &new.entity_type, &code, None)
                    .await?;
                code
            }
            None => generate_code(&new.entity_type),
        };

        let now = chrono::Utc::now();
        Ok(Entity {
            id: Uuid::new_v4(),
            organization_id: org,
            entity_type: new.entity_type,
            entity_name: new.entity_name,
            entity_code,
            smart_code: new.smart_code,
            status: ACTIVE_STATUS.to_string(),
            metadata: new.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get one entity of the organization
    pub async fn get_entity(&self, org: Uuid, id: Uuid) -> Result<Entity, CoreError> {
        tracing::debug!(%org, entity_id = %id, "get entity");
        self.find_entity(org, id).await
    }

    /// Filtered, paged entity read with optional hydration
    pub async fn read_entities(
        &self,
        org: Uuid,
        filter: EntityFilter,
        include: EntityInclude,
        page: Page,
    ) -> Result<PageResult<EntityRecord>, CoreError> {
        let page = self.page(page);
        let (entities, total) = self
            .entity_repo
            .query(org, &filter, page)
            .await
            .map_err(internal("query entities"))?;

        tracing::debug!(%org, returned = entities.len(), total, "read entities");

        let ids: HashSet<Uuid> = entities.iter().map(|e| e.id).collect();
        let mut fields = if include.dynamic_data {
            Some(self.read_fields_batch(org, &ids).await?)
        } else {
            None
        };
        let mut relationships = if include.relationships {
            let mut grouped: HashMap<Uuid, Vec<_>> = HashMap::new();
            for rel in self.read_outgoing_batch(org, &ids, None).await? {
                grouped.entry(rel.from_entity_id).or_default().push(rel);
            }
            Some(grouped)
        } else {
            None
        };

        let items = entities
            .into_iter()
            .map(|entity| EntityRecord {
                fields: fields
                    .as_mut()
                    .map(|all| all.remove(&entity.id).unwrap_or_default()),
                relationships: relationships
                    .as_mut()
                    .map(|all| all.remove(&entity.id).unwrap_or_default()),
                entity,
            })
            .collect();

        Ok(PageResult { items, total })
    }

    /// Apply a partial update
    pub async fn update_entity(
        &self,
        org: Uuid,
        id: Uuid,
        patch: EntityPatch,
    ) -> Result<Entity, CoreError> {
        if let Some(target_org) = patch.organization_id {
            if target_org != org {
                tracing::warn!(%org, %target_org, entity_id = %id, "rejected organization change");
                return Err(CoreError::validation("organization_id cannot be changed"));
            }
        }

        let mut entity = self.find_entity(org, id).await?;
        if entity.is_archived() {
            tracing::warn!(%org, entity_id = %id, "rejected update of archived entity");
            return Err(CoreError::validation("archived entities cannot be updated"));
        }

        if let Some(name) = patch.entity_name {
            require_non_empty(&name, "entity_name")?;
            entity.entity_name = name;
        }
        if let Some(smart_code) = patch.smart_code {
            parse_smart_code(&smart_code)?;
            entity.smart_code = smart_code;
        }
        if let Some(code) = patch.entity_code {
            require_non_empty(&code, "entity_code")?;
            if code != entity.entity_code {
                self.ensure_code_available(org, &entity.entity_type, &code, Some(id))
                    .await?;
                entity.entity_code = code;
            }
        }
        if let Some(status) = patch.status {
            require_non_empty(&status, "status")?;
            if status == ARCHIVED_STATUS {
                return Err(CoreError::validation("use delete_entity to archive an entity"));
            }
            entity.status = status;
        }
        if let Some(metadata) = patch.metadata {
            entity.metadata = metadata;
        }
        entity.updated_at = chrono::Utc::now();

        let updated = self
            .entity_repo
            .update(&entity)
            .await
            .map_err(internal("update entity"))?;

        tracing::info!(%org, entity_id = %id, "updated entity");
        Ok(updated)
    }

    /// Archive an entity together with the requested dependent rows
    pub async fn delete_entity(
        &self,
        org: Uuid,
        id: Uuid,
        cascade: CascadeOptions,
    ) -> Result<(), CoreError> {
        let entity = self.find_entity(org, id).await?;
        if entity.is_archived() {
            tracing::debug!(%org, entity_id = %id, "entity already archived");
            return Ok(());
        }

        self.entity_repo
            .archive(org, id, cascade)
            .await
            .map_err(internal("archive entity"))?;

        tracing::info!(
            %org,
            entity_id = %id,
            cascade_dynamic_data = cascade.dynamic_data,
            cascade_relationships = cascade.relationships,
            "archived entity"
        );
        Ok(())
    }

    async fn ensure_code_available(
        &self,
        org: Uuid,
        entity_type: &str,
        entity_code: &str,
        except: Option<Uuid>,
    ) -> Result<(), CoreError> {
        let existing = self
            .entity_repo
            .find_active_by_code(org, entity_type, entity_code)
            .await
            .map_err(internal("find entity by code"))?;

        match existing {
            Some(other) if Some(other.id) != except => {
                tracing::warn!(%org, entity_type, entity_code, "duplicate entity code");
                Err(CoreError::DuplicateCode {
                    entity_type: entity_type.to_string(),
                    entity_code: entity_code.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}
