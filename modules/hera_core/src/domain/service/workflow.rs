//! Workflow state machine over relationship edges

use super::{generate_code, internal, parse_smart_code, require_non_empty, Service};
use crate::contract::{
    Actor, AvailableTransition, CoreError, Entity, NewEntity, Relationship, RelationshipFilter,
    StageFlags, TransactionHeader, TransitionFlags, WorkflowDefinition, ACTIVE_STATUS,
};
use crate::domain::repository::{StatusChange, WorkflowRecords};
use crate::domain::workflow::{
    StatusNode, WorkflowDefinitionError, WorkflowGraph, AUDIT_SMART_CODE,
    AUDIT_TRANSACTION_TYPE, CAN_TRANSITION_TO, HAS_STAGE, HAS_WORKFLOW_STATUS,
    STAGE_LINK_SMART_CODE, STATUS_ENTITY_TYPE, STATUS_LINK_SMART_CODE, STATUS_SMART_CODE,
    TEMPLATE_ENTITY_TYPE, TRANSITION_SMART_CODE,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

impl Service {
    /// Validate a definition as a graph, then write template, statuses and edges
    /// in one repository call so a failure leaves nothing behind.
    ///
    /// Status codes are scoped to their template, so two templates may both
    /// define `SCHEDULED`.
    pub async fn define_workflow(
        &self,
        org: Uuid,
        definition: WorkflowDefinition,
    ) -> Result<Uuid, CoreError> {
        require_non_empty(&definition.template_name, "template_name")?;
        parse_smart_code(&definition.smart_code)?;

        let nodes: Vec<StatusNode> = definition
            .stages
            .iter()
            .map(|stage| {
                require_non_empty(&stage.code, "stage code")?;
                require_non_empty(&stage.name, "stage name")?;
                Ok(StatusNode {
                    status_id: Uuid::new_v4(),
                    code: stage.code.clone(),
                    name: stage.name.clone(),
                    flags: stage.flags,
                })
            })
            .collect::<Result<_, CoreError>>()?;
        let ids: HashMap<&str, Uuid> = nodes
            .iter()
            .map(|n| (n.code.as_str(), n.status_id))
            .collect();

        let transitions = definition
            .transitions
            .iter()
            .map(|t| {
                let from = ids.get(t.from.as_str()).ok_or_else(|| undefined(&t.from))?;
                let to = ids.get(t.to.as_str()).ok_or_else(|| undefined(&t.to))?;
                Ok((*from, *to, t.flags))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        // Definitions are always checked strictly, whatever the load mode
        let graph = WorkflowGraph::build(Uuid::nil(), nodes, transitions.clone(), true)
            .map_err(definition_error)?;

        let template = self
            .prepare_entity(
                org,
                NewEntity {
                    entity_type: TEMPLATE_ENTITY_TYPE.to_string(),
                    entity_name: definition.template_name,
                    smart_code: definition.smart_code,
                    entity_code: definition.template_code,
                    metadata: None,
                },
            )
            .await?;

        let now = template.created_at;
        let statuses: Vec<Entity> = graph
            .stages()
            .iter()
            .map(|node| Entity {
                id: node.status_id,
                organization_id: org,
                entity_type: STATUS_ENTITY_TYPE.to_string(),
                entity_name: node.name.clone(),
                entity_code: node.code.clone(),
                smart_code: STATUS_SMART_CODE.to_string(),
                status: ACTIVE_STATUS.to_string(),
                metadata: json!({ "template_id": template.id }),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let stage_edges = graph.stages().iter().map(|node| {
            edge(
                org,
                template.id,
                node.status_id,
                HAS_STAGE,
                to_data(&node.flags),
                STAGE_LINK_SMART_CODE,
            )
        });
        let transition_edges = transitions.iter().map(|(from, to, flags)| {
            edge(
                org,
                *from,
                *to,
                CAN_TRANSITION_TO,
                to_data(flags),
                TRANSITION_SMART_CODE,
            )
        });

        let records = WorkflowRecords {
            edges: stage_edges.chain(transition_edges).collect(),
            statuses,
            template,
        };
        self.workflow_repo
            .insert_definition(&records)
            .await
            .map_err(internal("define workflow"))?;

        tracing::info!(
            %org,
            template_id = %records.template.id,
            stages = graph.stages().len(),
            transitions = transitions.len(),
            "defined workflow"
        );
        Ok(records.template.id)
    }

    /// Load a template from its `has_stage` and `can_transition_to` edges
    pub async fn load_workflow(
        &self,
        org: Uuid,
        template_id: Uuid,
    ) -> Result<WorkflowGraph, CoreError> {
        let strict = self.config.strict_workflow_validation;
        let template = self.find_entity(org, template_id).await?;
        if template.entity_type != TEMPLATE_ENTITY_TYPE {
            return Err(CoreError::validation(format!(
                "entity {} is not a workflow template",
                template_id
            )));
        }

        let stage_links = self
            .read_outgoing_batch(org, &HashSet::from([template_id]), Some(HAS_STAGE))
            .await?;
        let status_ids: HashSet<Uuid> = stage_links.iter().map(|l| l.to_entity_id).collect();

        let mut statuses: HashMap<Uuid, Entity> = HashMap::with_capacity(status_ids.len());
        for chunk in self.chunked(&status_ids) {
            let found = self
                .entity_repo
                .find_by_ids(org, &chunk)
                .await
                .map_err(internal("find workflow statuses"))?;
            statuses.extend(found.into_iter().map(|e| (e.id, e)));
        }

        let mut nodes = Vec::with_capacity(stage_links.len());
        for link in &stage_links {
            let Some(status) = statuses.get(&link.to_entity_id) else {
                if strict {
                    return Err(definition_error(WorkflowDefinitionError::UndefinedStatus(
                        link.to_entity_id.to_string(),
                    )));
                }
                tracing::warn!(%template_id, status_id = %link.to_entity_id, "skipping missing stage");
                continue;
            };
            let flags: StageFlags = edge_flags(link)?;
            nodes.push(StatusNode {
                status_id: status.id,
                code: status.entity_code.clone(),
                name: status.entity_name.clone(),
                flags,
            });
        }

        let transitions = self
            .read_outgoing_batch(org, &status_ids, Some(CAN_TRANSITION_TO))
            .await?
            .iter()
            .map(|edge| {
                let flags: TransitionFlags = edge_flags(edge)?;
                Ok((edge.from_entity_id, edge.to_entity_id, flags))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let graph = WorkflowGraph::build(template_id, nodes, transitions, strict)
            .map_err(definition_error)?;
        tracing::debug!(%org, %template_id, stages = graph.stages().len(), "loaded workflow");
        Ok(graph)
    }

    /// Whether the template owning `current_status_id` allows the move.
    ///
    /// Statuses that belong to no template have no legal moves.
    pub async fn can_transition(
        &self,
        org: Uuid,
        current_status_id: Uuid,
        target_status_id: Uuid,
    ) -> Result<bool, CoreError> {
        let Some(graph) = self.graph_for_status(org, current_status_id).await? else {
            return Ok(false);
        };
        Ok(graph.can_transition(current_status_id, target_status_id))
    }

    /// Place a record in the initial stage of a template.
    ///
    /// Without an explicit template the policy registered for the record's
    /// smart code decides.
    pub async fn start_workflow(
        &self,
        org: Uuid,
        record_id: Uuid,
        template_id: Option<Uuid>,
        actor: &Actor,
    ) -> Result<TransactionHeader, CoreError> {
        let record = self.find_entity(org, record_id).await?;
        reject_archived(&record)?;
        let template_id = template_id
            .or_else(|| {
                self.policy_for(&record.smart_code)
                    .and_then(|p| p.workflow_template)
            })
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "no workflow template for smart code {}",
                    record.smart_code
                ))
            })?;

        if self.current_link(org, record_id).await?.is_some() {
            return Err(CoreError::validation(format!(
                "record {} is already in a workflow",
                record_id
            )));
        }

        let graph = self.load_workflow(org, template_id).await?;
        let initial = graph.initial();

        let change = status_change(org, record_id, None, template_id, initial, actor);
        let audit = change.audit.clone();
        self.workflow_repo
            .apply_status_change(&change)
            .await
            .map_err(internal("start workflow"))?;

        tracing::info!(%org, %record_id, %template_id, status = %initial.code, "started workflow");
        Ok(audit)
    }

    /// Move a record along an existing `can_transition_to` edge
    pub async fn apply_transition(
        &self,
        org: Uuid,
        record_id: Uuid,
        target_status_id: Uuid,
        actor: &Actor,
    ) -> Result<TransactionHeader, CoreError> {
        let record = self.find_entity(org, record_id).await?;
        reject_archived(&record)?;
        let link = self.current_link(org, record_id).await?.ok_or_else(|| {
            CoreError::validation(format!("record {} is not in a workflow", record_id))
        })?;
        let from = link.to_entity_id;
        let template_id = link_template(&link).ok_or_else(|| {
            CoreError::validation(format!("status link of record {} names no template", record_id))
        })?;
        let graph = self.load_workflow(org, template_id).await?;

        let Some(flags) = graph.transition(from, target_status_id) else {
            tracing::warn!(%org, %record_id, %from, to = %target_status_id, "illegal transition");
            return Err(CoreError::IllegalTransition {
                from,
                to: target_status_id,
            });
        };
        if flags.requires_approval && !actor.can_approve {
            tracing::warn!(%org, %record_id, %from, to = %target_status_id, "approval required");
            return Err(CoreError::ApprovalRequired {
                from,
                to: target_status_id,
            });
        }
        let target = graph.status(target_status_id).ok_or_else(|| CoreError::IllegalTransition {
            from,
            to: target_status_id,
        })?;

        let change = status_change(org, record_id, Some(&link), graph.template_id(), target, actor);
        let audit = change.audit.clone();
        self.workflow_repo
            .apply_status_change(&change)
            .await
            .map_err(internal("apply transition"))?;

        tracing::info!(
            %org,
            %record_id,
            %from,
            to = %target_status_id,
            status = %target.code,
            final_status = graph.is_final(target_status_id),
            "applied transition"
        );
        Ok(audit)
    }

    /// Status entity the record currently points at
    pub async fn current_status(
        &self,
        org: Uuid,
        record_id: Uuid,
    ) -> Result<Option<Entity>, CoreError> {
        self.find_entity(org, record_id).await?;
        let Some(link) = self.current_link(org, record_id).await? else {
            return Ok(None);
        };
        self.entity_repo
            .find_by_id(org, link.to_entity_id)
            .await
            .map_err(internal("find current status"))
    }

    /// Statuses reachable in one step from the record's current status
    pub async fn available_transitions(
        &self,
        org: Uuid,
        record_id: Uuid,
    ) -> Result<Vec<AvailableTransition>, CoreError> {
        let Some(current) = self.current_status(org, record_id).await? else {
            return Ok(Vec::new());
        };

        let Some(graph) = self.graph_for_status(org, current.id).await? else {
            return Ok(Vec::new());
        };
        let moves = graph.transitions_from(current.id);

        let target_ids: Vec<Uuid> = moves.iter().map(|(node, _)| node.status_id).collect();
        let targets: HashMap<Uuid, Entity> = self
            .entity_repo
            .find_by_ids(org, &target_ids)
            .await
            .map_err(internal("find transition targets"))?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        Ok(moves
            .into_iter()
            .filter_map(|(node, flags)| {
                targets.get(&node.status_id).map(|status| AvailableTransition {
                    status: status.clone(),
                    flags,
                })
            })
            .collect())
    }

    /// The record's active `has_workflow_status` edge
    async fn current_link(
        &self,
        org: Uuid,
        record_id: Uuid,
    ) -> Result<Option<Relationship>, CoreError> {
        let mut links = self
            .query_relationships(
                org,
                RelationshipFilter {
                    from_entity_id: Some(record_id),
                    relationship_type: Some(HAS_WORKFLOW_STATUS.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        if links.len() > 1 {
            tracing::warn!(%org, %record_id, count = links.len(), "record has several active status links");
        }
        // Newest wins
        Ok(links.pop())
    }

    /// Graph of the template a status entity belongs to
    async fn graph_for_status(
        &self,
        org: Uuid,
        status_id: Uuid,
    ) -> Result<Option<WorkflowGraph>, CoreError> {
        let status = self.find_entity(org, status_id).await?;
        if status.entity_type != STATUS_ENTITY_TYPE {
            return Ok(None);
        }
        let Some(template_id) = template_ref(&status.metadata) else {
            tracing::warn!(%org, %status_id, "workflow status names no template");
            return Ok(None);
        };
        self.load_workflow(org, template_id).await.map(Some)
    }
}

/// Reject payloads of workflow edges that would not load later
pub(super) fn validate_edge_data(
    relationship_type: &str,
    data: &serde_json::Value,
) -> Result<(), CoreError> {
    match relationship_type {
        HAS_STAGE => parse_flags::<StageFlags>(data).map(|_| ()),
        CAN_TRANSITION_TO => parse_flags::<TransitionFlags>(data).map(|_| ()),
        _ => Ok(()),
    }
}

fn status_change(
    org: Uuid,
    record_id: Uuid,
    previous: Option<&Relationship>,
    template_id: Uuid,
    target: &StatusNode,
    actor: &Actor,
) -> StatusChange {
    let now = chrono::Utc::now();
    let from_status_id = previous.map(|l| l.to_entity_id);

    StatusChange {
        organization_id: org,
        record_id,
        previous_link: previous.map(|l| l.id),
        new_link: edge(
            org,
            record_id,
            target.status_id,
            HAS_WORKFLOW_STATUS,
            json!({ "template_id": template_id }),
            STATUS_LINK_SMART_CODE,
        ),
        record_status: target.code.clone(),
        audit: TransactionHeader {
            id: Uuid::new_v4(),
            organization_id: org,
            transaction_type: AUDIT_TRANSACTION_TYPE.to_string(),
            transaction_code: generate_code("WF"),
            smart_code: AUDIT_SMART_CODE.to_string(),
            status: "completed".to_string(),
            total_amount: 0.0,
            source_entity_id: Some(record_id),
            target_entity_id: Some(target.status_id),
            transaction_date: now,
            metadata: json!({
                "from_status_id": from_status_id,
                "to_status_id": target.status_id,
                "actor_id": actor.actor_id,
                "template_id": template_id,
            }),
            created_at: now,
            updated_at: now,
        },
    }
}

fn edge(
    org: Uuid,
    from: Uuid,
    to: Uuid,
    relationship_type: &str,
    data: serde_json::Value,
    smart_code: &str,
) -> Relationship {
    let now = chrono::Utc::now();
    Relationship {
        id: Uuid::new_v4(),
        organization_id: org,
        from_entity_id: from,
        to_entity_id: to,
        relationship_type: relationship_type.to_string(),
        relationship_data: data,
        smart_code: smart_code.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Flags stored on a workflow edge; malformed data never reads as "no flags"
fn edge_flags<T: DeserializeOwned + Default>(edge: &Relationship) -> Result<T, CoreError> {
    parse_flags(&edge.relationship_data).map_err(|e| {
        tracing::warn!(relationship_id = %edge.id, error = %e, "malformed workflow edge data");
        e
    })
}

fn parse_flags<T: DeserializeOwned + Default>(data: &serde_json::Value) -> Result<T, CoreError> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data.clone())
        .map_err(|e| CoreError::validation(format!("malformed workflow edge data: {}", e)))
}

fn reject_archived(record: &Entity) -> Result<(), CoreError> {
    if record.is_archived() {
        tracing::warn!(record_id = %record.id, "rejected workflow change of archived record");
        return Err(CoreError::validation(format!(
            "record {} is archived",
            record.id
        )));
    }
    Ok(())
}

fn link_template(link: &Relationship) -> Option<Uuid> {
    template_ref(&link.relationship_data)
}

fn template_ref(data: &serde_json::Value) -> Option<Uuid> {
    data.get("template_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn to_data<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|_| json!({}))
}

fn undefined(code: &str) -> CoreError {
    definition_error(WorkflowDefinitionError::UndefinedStatus(code.to_string()))
}

fn definition_error(err: WorkflowDefinitionError) -> CoreError {
    tracing::warn!(error = %err, "invalid workflow definition");
    CoreError::validation(err.to_string())
}
