//! Workflow templates loaded as an arena of status nodes plus an adjacency list

use crate::contract::{StageFlags, TransitionFlags};
use std::collections::HashMap;
use uuid::Uuid;

/// Entity type of workflow templates
pub const TEMPLATE_ENTITY_TYPE: &str = "workflow_template";
/// Entity type of workflow statuses
pub const STATUS_ENTITY_TYPE: &str = "workflow_status";
/// Template -> status edge
pub const HAS_STAGE: &str = "has_stage";
/// Status -> status edge describing a legal move
pub const CAN_TRANSITION_TO: &str = "can_transition_to";
/// Record -> status edge marking the current status
pub const HAS_WORKFLOW_STATUS: &str = "has_workflow_status";

pub const STAGE_LINK_SMART_CODE: &str = "HERA.WORKFLOW.TEMPLATE.STAGE.LINK.v1";
pub const TRANSITION_SMART_CODE: &str = "HERA.WORKFLOW.STATUS.TRANSITION.RULE.v1";
pub const STATUS_SMART_CODE: &str = "HERA.WORKFLOW.STATUS.ENTITY.STAGE.v1";
pub const STATUS_LINK_SMART_CODE: &str = "HERA.WORKFLOW.RECORD.STATUS.ASSIGN.v1";
pub const AUDIT_SMART_CODE: &str = "HERA.WORKFLOW.TRANSITION.AUDIT.LOG.v1";
/// Transaction type of workflow audit entries
pub const AUDIT_TRANSACTION_TYPE: &str = "workflow_transition";

/// Inconsistent template data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowDefinitionError {
    #[error("workflow has no initial stage")]
    NoInitialStage,
    #[error("workflow has {0} initial stages, expected exactly one")]
    MultipleInitialStages(usize),
    #[error("stage '{0}' is defined more than once")]
    DuplicateStage(String),
    #[error("transition references undefined status '{0}'")]
    UndefinedStatus(String),
}

/// One status of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNode {
    pub status_id: Uuid,
    pub code: String,
    pub name: String,
    pub flags: StageFlags,
}

/// Runtime-loaded workflow template
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowGraph {
    template_id: Uuid,
    nodes: Vec<StatusNode>,
    index: HashMap<Uuid, usize>,
    adjacency: Vec<Vec<(usize, TransitionFlags)>>,
    initial: usize,
}

impl WorkflowGraph {
    /// Build a graph from stages and `(from, to, flags)` transitions.
    ///
    /// Strict mode requires exactly one initial stage and rejects transitions
    /// touching undefined statuses. Permissive mode drops such transitions and
    /// picks the lowest-order initial stage.
    pub fn build(
        template_id: Uuid,
        mut stages: Vec<StatusNode>,
        transitions: Vec<(Uuid, Uuid, TransitionFlags)>,
        strict: bool,
    ) -> Result<Self, WorkflowDefinitionError> {
        stages.sort_by(|a, b| a.flags.order.cmp(&b.flags.order).then(a.code.cmp(&b.code)));

        let mut index = HashMap::with_capacity(stages.len());
        let mut codes = std::collections::HashSet::with_capacity(stages.len());
        for (i, node) in stages.iter().enumerate() {
            if index.insert(node.status_id, i).is_some() || !codes.insert(node.code.as_str()) {
                return Err(WorkflowDefinitionError::DuplicateStage(node.code.clone()));
            }
        }

        let initials: Vec<usize> = stages
            .iter()
            .enumerate()
            .filter(|(_, n)| n.flags.is_initial)
            .map(|(i, _)| i)
            .collect();
        let initial = match initials.as_slice() {
            [] => return Err(WorkflowDefinitionError::NoInitialStage),
            [only] => *only,
            [first, ..] if !strict => *first,
            many => return Err(WorkflowDefinitionError::MultipleInitialStages(many.len())),
        };

        let mut adjacency = vec![Vec::new(); stages.len()];
        for (from, to, flags) in transitions {
            match (index.get(&from), index.get(&to)) {
                (Some(&f), Some(&t)) => adjacency[f].push((t, flags)),
                _ if !strict => {
                    tracing::warn!(%template_id, %from, %to, "dropping transition to undefined status");
                }
                (None, _) => return Err(WorkflowDefinitionError::UndefinedStatus(from.to_string())),
                (_, None) => return Err(WorkflowDefinitionError::UndefinedStatus(to.to_string())),
            }
        }

        Ok(Self {
            template_id,
            nodes: stages,
            index,
            adjacency,
            initial,
        })
    }

    pub fn template_id(&self) -> Uuid {
        self.template_id
    }

    /// Stages ordered by their `order` flag
    pub fn stages(&self) -> &[StatusNode] {
        &self.nodes
    }

    pub fn initial(&self) -> &StatusNode {
        &self.nodes[self.initial]
    }

    pub fn status(&self, status_id: Uuid) -> Option<&StatusNode> {
        self.index.get(&status_id).map(|&i| &self.nodes[i])
    }

    pub fn status_by_code(&self, code: &str) -> Option<&StatusNode> {
        self.nodes.iter().find(|n| n.code == code)
    }

    /// Flags of the edge `from -> to`, if it exists
    pub fn transition(&self, from: Uuid, to: Uuid) -> Option<TransitionFlags> {
        let f = *self.index.get(&from)?;
        let t = *self.index.get(&to)?;
        self.adjacency[f]
            .iter()
            .find(|(target, _)| *target == t)
            .map(|(_, flags)| *flags)
    }

    pub fn can_transition(&self, from: Uuid, to: Uuid) -> bool {
        self.transition(from, to).is_some()
    }

    /// Statuses reachable in one step from `from`
    pub fn transitions_from(&self, from: Uuid) -> Vec<(&StatusNode, TransitionFlags)> {
        self.index
            .get(&from)
            .map(|&f| {
                self.adjacency[f]
                    .iter()
                    .map(|(t, flags)| (&self.nodes[*t], *flags))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_final(&self, status_id: Uuid) -> bool {
        self.status(status_id).is_some_and(|n| n.flags.is_final)
    }
}
