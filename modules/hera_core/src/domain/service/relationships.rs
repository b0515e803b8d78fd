//! Relationship graph operations

use super::workflow::validate_edge_data;
use super::{internal, parse_smart_code, require_non_empty, Service};
use crate::contract::{
    CoreError, LinkedRelationship, NewRelationship, Relationship, RelationshipFilter,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

impl Service {
    /// Link two entities of the organization
    pub async fn create_relationship(
        &self,
        org: Uuid,
        new: NewRelationship,
    ) -> Result<Relationship, CoreError> {
        require_non_empty(&new.relationship_type, "relationship_type")?;
        parse_smart_code(&new.smart_code)?;
        validate_edge_data(&new.relationship_type, &new.relationship_data)?;
        self.resolve_reference(org, new.from_entity_id).await?;
        self.resolve_reference(org, new.to_entity_id).await?;

        let now = chrono::Utc::now();
        let relationship = Relationship {
            id: Uuid::new_v4(),
            organization_id: org,
            from_entity_id: new.from_entity_id,
            to_entity_id: new.to_entity_id,
            relationship_type: new.relationship_type,
            relationship_data: new.relationship_data,
            smart_code: new.smart_code,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .relationship_repo
            .insert(&relationship)
            .await
            .map_err(internal("insert relationship"))?;

        tracing::info!(
            %org,
            relationship_id = %created.id,
            relationship_type = %created.relationship_type,
            from = %created.from_entity_id,
            to = %created.to_entity_id,
            "created relationship"
        );
        Ok(created)
    }

    /// Edges matching the filter
    pub async fn query_relationships(
        &self,
        org: Uuid,
        filter: RelationshipFilter,
    ) -> Result<Vec<Relationship>, CoreError> {
        tracing::debug!(%org, ?filter, "query relationships");
        self.relationship_repo
            .query(org, &filter)
            .await
            .map_err(internal("query relationships"))
    }

    /// Edges paired with the entity opposite the filter's anchor.
    ///
    /// Anchored on `to_entity_id` only, the linked entity is the source;
    /// otherwise it is the target.
    pub async fn query_relationships_hydrated(
        &self,
        org: Uuid,
        filter: RelationshipFilter,
    ) -> Result<Vec<LinkedRelationship>, CoreError> {
        let towards_source = filter.from_entity_id.is_none() && filter.to_entity_id.is_some();
        let far_end = |rel: &Relationship| {
            if towards_source {
                rel.from_entity_id
            } else {
                rel.to_entity_id
            }
        };

        let relationships = self.query_relationships(org, filter).await?;

        let ids: HashSet<Uuid> = relationships.iter().map(far_end).collect();
        let mut linked: HashMap<Uuid, _> = HashMap::with_capacity(ids.len());
        for chunk in self.chunked(&ids) {
            let entities = self
                .entity_repo
                .find_by_ids(org, &chunk)
                .await
                .map_err(internal("find linked entities"))?;
            linked.extend(entities.into_iter().map(|e| (e.id, e)));
        }

        Ok(relationships
            .into_iter()
            .map(|relationship| LinkedRelationship {
                linked_entity: linked.get(&far_end(&relationship)).cloned(),
                relationship,
            })
            .collect())
    }

    /// Mark an edge inactive
    pub async fn deactivate_relationship(&self, org: Uuid, id: Uuid) -> Result<(), CoreError> {
        let relationship = self
            .relationship_repo
            .find_by_id(org, id)
            .await
            .map_err(internal("find relationship"))?
            .ok_or_else(|| CoreError::not_found("relationship", id))?;

        if !relationship.is_active {
            return Ok(());
        }

        self.relationship_repo
            .deactivate(org, id)
            .await
            .map_err(internal("deactivate relationship"))?;

        tracing::info!(%org, relationship_id = %id, "deactivated relationship");
        Ok(())
    }
}
