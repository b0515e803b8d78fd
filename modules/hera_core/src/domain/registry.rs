//! Smart code registry: prefix -> policy lookup
//!
//! Policies attach validation rules and workflow templates to whole families of
//! smart codes, so a new business domain is added as data.

use super::smart_code::SmartCode;
use super::value::CompiledRules;
use crate::contract::{CoreError, FieldDefinition};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Behavior resolved for a smart code family
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmartCodePolicy {
    /// Field definitions keyed by field name
    pub field_rules: HashMap<String, FieldDefinition>,
    /// Workflow template new records enter when none is given explicitly
    pub workflow_template: Option<Uuid>,
    /// Free-form policy data (posting rules etc.) for callers
    pub metadata: serde_json::Value,
}

impl SmartCodePolicy {
    pub fn field(&self, field_name: &str) -> Option<&FieldDefinition> {
        self.field_rules.get(field_name)
    }
}

/// A registered policy with the patterns and schemas of its field rules compiled
#[derive(Debug)]
pub struct CompiledPolicy {
    policy: SmartCodePolicy,
    compiled: HashMap<String, CompiledRules>,
}

impl CompiledPolicy {
    fn compile(prefix: &str, policy: SmartCodePolicy) -> Result<Self, CoreError> {
        let compiled = policy
            .field_rules
            .iter()
            .map(|(name, def)| {
                CompiledRules::compile(name, &def.rules)
                    .map(|rules| (name.clone(), rules))
                    .map_err(|message| {
                        CoreError::validation(format!("policy {}: {}", prefix, message))
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { policy, compiled })
    }

    /// Registered definition of a field together with its compiled rules
    pub fn compiled_field(&self, field_name: &str) -> Option<(&FieldDefinition, &CompiledRules)> {
        Some((
            self.policy.field(field_name)?,
            self.compiled.get(field_name)?,
        ))
    }
}

impl Deref for CompiledPolicy {
    type Target = SmartCodePolicy;

    fn deref(&self) -> &SmartCodePolicy {
        &self.policy
    }
}

/// Registry keyed by dotted smart-code prefix (`HERA.<DOMAIN>[.<SEG>...]`)
#[derive(Debug, Default)]
pub struct SmartCodeRegistry {
    policies: HashMap<String, Arc<CompiledPolicy>>,
    /// Resolution per stored smart code string, cleared on every registration
    resolved: Mutex<HashMap<String, Option<Arc<CompiledPolicy>>>>,
}

impl SmartCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for a prefix; replaces any previous policy for it
    pub fn register(&mut self, prefix: &str, policy: SmartCodePolicy) -> Result<(), CoreError> {
        validate_prefix(prefix)?;
        let compiled = CompiledPolicy::compile(prefix, policy)?;
        self.policies.insert(prefix.to_string(), Arc::new(compiled));
        self.resolved.get_mut().clear();
        Ok(())
    }

    /// Most specific policy whose prefix covers the code
    pub fn resolve(&self, code: &SmartCode) -> Option<Arc<CompiledPolicy>> {
        code.prefixes()
            .iter()
            .find_map(|prefix| self.policies.get(prefix).cloned())
    }

    /// `resolve` for a stored code; each distinct code is parsed once.
    /// Invalid codes resolve to `None`.
    pub fn resolve_str(&self, smart_code: &str) -> Option<Arc<CompiledPolicy>> {
        if let Some(hit) = self.resolved.lock().get(smart_code) {
            return hit.clone();
        }
        let resolved = SmartCode::parse(smart_code)
            .ok()
            .and_then(|code| self.resolve(&code));
        self.resolved
            .lock()
            .insert(smart_code.to_string(), resolved.clone());
        resolved
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// A prefix is a smart code without version and with any number of segments
fn validate_prefix(prefix: &str) -> Result<(), CoreError> {
    let segment_count = prefix.split('.').count().saturating_sub(2);
    // Pad to the minimum segment count and attach a version so the full grammar applies.
    let mut candidate = prefix.to_string();
    for _ in segment_count..3 {
        candidate.push_str(".XX");
    }
    candidate.push_str(".v1");
    SmartCode::parse(&candidate)
        .map(|_| ())
        .map_err(|_| CoreError::InvalidSmartCode {
            code: prefix.to_string(),
            details: "registry prefix must look like HERA.<DOMAIN>[.<SEG>...]".to_string(),
        })
}
