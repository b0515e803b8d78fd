//! Dynamic attribute store operations

use super::{internal, parse_smart_code, require_non_empty, Service};
use crate::contract::{
    CoreError, DynamicField, FieldDefinition, FieldWrite, Relationship, TypedValue,
};
use crate::domain::value;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

impl Service {
    /// Validate and write one field.
    ///
    /// Explicit rules on the write win over rules registered for the entity's
    /// smart code. An absent value on an optional field clears the field and
    /// returns `None`.
    pub async fn set_field(
        &self,
        org: Uuid,
        entity_id: Uuid,
        write: FieldWrite,
    ) -> Result<Option<DynamicField>, CoreError> {
        require_non_empty(&write.field_name, "field_name")?;
        parse_smart_code(&write.smart_code)?;
        let entity = self.find_entity(org, entity_id).await?;

        let policy = self.policy_for(&entity.smart_code);
        let registered = policy
            .as_deref()
            .and_then(|policy| policy.compiled_field(&write.field_name));
        if let Some((def, _)) = registered {
            if def.field_type != write.field_type {
                return Err(CoreError::validation(format!(
                    "{} is declared as {}",
                    write.field_name, def.field_type
                )));
            }
        }

        let definition = FieldDefinition {
            field_name: write.field_name.clone(),
            field_type: write.field_type,
            is_required: write.is_required || registered.is_some_and(|(def, _)| def.is_required),
            rules: write
                .rules
                .clone()
                .or_else(|| registered.map(|(def, _)| def.rules.clone()))
                .unwrap_or_default(),
        };

        // Registered rules were compiled when the policy was registered
        let violation = match (&write.rules, registered) {
            (None, Some((_, compiled))) => {
                value::validate_compiled(&definition, compiled, &write.value)
            }
            _ => value::validate(&definition, &write.value),
        };
        if let Some(message) = violation {
            tracing::warn!(%org, %entity_id, field = %write.field_name, %message, "field rejected");
            return Err(CoreError::validation(message));
        }

        let Some(typed) = value::coerce(&write.value, write.field_type) else {
            let cleared = self
                .dynamic_repo
                .clear(org, entity_id, &write.field_name)
                .await
                .map_err(internal("clear field"))?;
            tracing::info!(%org, %entity_id, field = %write.field_name, cleared, "cleared field");
            return Ok(None);
        };

        let now = chrono::Utc::now();
        let field = DynamicField {
            id: Uuid::new_v4(),
            organization_id: org,
            entity_id,
            field_name: write.field_name,
            field_type: write.field_type,
            value: typed,
            smart_code: write.smart_code,
            validation_rules: Some(definition.rules).filter(|rules| !rules.is_empty()),
            is_required: definition.is_required,
            field_order: write.field_order,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .dynamic_repo
            .upsert(&field)
            .await
            .map_err(internal("upsert field"))?;

        tracing::info!(%org, %entity_id, field = %stored.field_name, "wrote field");
        Ok(Some(stored))
    }

    /// Live fields of one entity
    pub async fn get_fields(
        &self,
        org: Uuid,
        entity_id: Uuid,
    ) -> Result<BTreeMap<String, TypedValue>, CoreError> {
        self.find_entity(org, entity_id).await?;
        let mut batch = self.read_fields_batch(org, &HashSet::from([entity_id])).await?;
        Ok(batch.remove(&entity_id).unwrap_or_default())
    }

    /// Fields of many entities, fetched in chunks of `batch_chunk_size` ids.
    ///
    /// Entities without live fields are absent from the result.
    pub async fn read_fields_batch(
        &self,
        org: Uuid,
        entity_ids: &HashSet<Uuid>,
    ) -> Result<HashMap<Uuid, BTreeMap<String, TypedValue>>, CoreError> {
        let mut result: HashMap<Uuid, BTreeMap<String, TypedValue>> = HashMap::new();
        if entity_ids.is_empty() {
            return Ok(result);
        }

        for chunk in self.chunked(entity_ids) {
            let rows = self
                .dynamic_repo
                .find_for_entities(org, &chunk)
                .await
                .map_err(internal("read fields batch"))?;
            for row in rows {
                result
                    .entry(row.entity_id)
                    .or_default()
                    .insert(row.field_name, row.value);
            }
        }

        tracing::debug!(%org, requested = entity_ids.len(), hydrated = result.len(), "read fields batch");
        Ok(result)
    }

    /// Active edges leaving any of the given entities, fetched in chunks
    pub(super) async fn read_outgoing_batch(
        &self,
        org: Uuid,
        entity_ids: &HashSet<Uuid>,
        relationship_type: Option<&str>,
    ) -> Result<Vec<Relationship>, CoreError> {
        let mut result = Vec::new();
        if entity_ids.is_empty() {
            return Ok(result);
        }

        for chunk in self.chunked(entity_ids) {
            let rows = self
                .relationship_repo
                .find_from_entities(org, &chunk, relationship_type)
                .await
                .map_err(internal("read relationships batch"))?;
            result.extend(rows);
        }
        Ok(result)
    }

    /// Sorted ids split into lookups of at most `batch_chunk_size`
    pub(super) fn chunked(&self, ids: &HashSet<Uuid>) -> Vec<Vec<Uuid>> {
        let mut sorted: Vec<Uuid> = ids.iter().copied().collect();
        sorted.sort_unstable();
        sorted
            .chunks(self.config.batch_chunk_size.max(1))
            .map(<[Uuid]>::to_vec)
            .collect()
    }
}
