//! Domain service - business logic orchestration
//!
//! One `Service` owns every repository and the smart code registry. Operations
//! are grouped by store in the submodules; all of them validate their input
//! completely before the first write.

mod entities;
mod fields;
mod relationships;
mod transactions;
mod workflow;

use super::registry::{CompiledPolicy, SmartCodePolicy, SmartCodeRegistry};
use super::repository::{
    DynamicDataRepository, EntityRepository, RelationshipRepository, TransactionRepository,
    WorkflowRepository,
};
use super::smart_code::SmartCode;
use crate::config::Config;
use crate::contract::{CoreError, Entity, Page};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Domain service for the HERA core
pub struct Service {
    config: Config,
    entity_repo: Arc<dyn EntityRepository>,
    dynamic_repo: Arc<dyn DynamicDataRepository>,
    relationship_repo: Arc<dyn RelationshipRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    workflow_repo: Arc<dyn WorkflowRepository>,
    registry: RwLock<SmartCodeRegistry>,
}

impl Service {
    /// Create a new service instance; policies from the config are registered up front
    pub fn new(
        config: Config,
        entity_repo: Arc<dyn EntityRepository>,
        dynamic_repo: Arc<dyn DynamicDataRepository>,
        relationship_repo: Arc<dyn RelationshipRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        workflow_repo: Arc<dyn WorkflowRepository>,
    ) -> Result<Self, CoreError> {
        let mut registry = SmartCodeRegistry::new();
        for (prefix, policy) in &config.policies {
            registry.register(prefix, policy.clone())?;
        }
        tracing::debug!(policies = registry.len(), "smart code registry loaded");

        Ok(Self {
            config,
            entity_repo,
            dynamic_repo,
            relationship_repo,
            transaction_repo,
            workflow_repo,
            registry: RwLock::new(registry),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register or replace the policy for a smart code prefix
    pub fn register_policy(&self, prefix: &str, policy: SmartCodePolicy) -> Result<(), CoreError> {
        self.registry.write().register(prefix, policy)?;
        tracing::info!(prefix, "registered smart code policy");
        Ok(())
    }

    /// Policy covering a stored smart code, if any
    fn policy_for(&self, smart_code: &str) -> Option<Arc<CompiledPolicy>> {
        self.registry.read().resolve_str(smart_code)
    }

    fn page(&self, page: Page) -> Page {
        Page::new(page.offset, self.config.page_limit(page.limit))
    }

    /// Entity of the organization, or `NotFound`
    async fn find_entity(&self, org: Uuid, id: Uuid) -> Result<Entity, CoreError> {
        self.entity_repo
            .find_by_id(org, id)
            .await
            .map_err(internal("find entity"))?
            .ok_or_else(|| CoreError::not_found("entity", id))
    }

    /// Entity referenced by another record; tells a foreign entity apart from a missing one
    async fn resolve_reference(&self, org: Uuid, id: Uuid) -> Result<Entity, CoreError> {
        if let Some(entity) = self
            .entity_repo
            .find_by_id(org, id)
            .await
            .map_err(internal("find entity"))?
        {
            return Ok(entity);
        }

        match self
            .entity_repo
            .find_owner(id)
            .await
            .map_err(internal("find entity owner"))?
        {
            Some(owner) if owner != org => {
                tracing::warn!(%org, %owner, entity_id = %id, "rejected cross-tenant reference");
                Err(CoreError::CrossTenant {
                    organization_id: org,
                    entity_id: id,
                })
            }
            _ => Err(CoreError::not_found("entity", id)),
        }
    }
}

/// Parse a smart code supplied with a write
fn parse_smart_code(code: &str) -> Result<SmartCode, CoreError> {
    SmartCode::parse(code).inspect_err(|e| tracing::warn!(error = %e, "rejected smart code"))
}

/// Log a repository failure and hide it behind `CoreError::Internal`
fn internal(operation: &'static str) -> impl FnOnce(anyhow::Error) -> CoreError {
    move |err| {
        tracing::error!(operation, error = %err, "repository call failed");
        CoreError::Internal
    }
}

/// `<PREFIX>-<8 hex>` code for records created without one
fn generate_code(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix.to_uppercase(), hex[..8].to_uppercase())
}

fn require_non_empty(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!("{} is required", field)));
    }
    Ok(())
}
