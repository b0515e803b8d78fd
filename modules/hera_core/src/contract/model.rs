//! Contract models for the HERA core
//!
//! These models are transport-agnostic and used for inter-module communication.
//! Serde derives are limited to the types persisted as JSON next to other
//! rows or loaded from configuration: field types, validation rules and
//! workflow edge flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Status value of an entity that has been soft deleted
pub const ARCHIVED_STATUS: &str = "archived";

/// Status value of a freshly created entity
pub const ACTIVE_STATUS: &str = "active";

// ===== Typed values =====

/// Declared type of a dynamic field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Json,
    /// Array of allow-listed values, stored in the json slot
    Multiselect,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::Multiselect => "multiselect",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "json" => Some(FieldType::Json),
            "multiselect" => Some(FieldType::Multiselect),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced field value. Exactly one variant, so storage slots cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Json(serde_json::Value),
}

impl TypedValue {
    /// Whether this value may be stored under the given field type
    pub fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (TypedValue::Text(_), FieldType::Text)
                | (TypedValue::Number(_), FieldType::Number)
                | (TypedValue::Boolean(_), FieldType::Boolean)
                | (TypedValue::Date(_), FieldType::Date)
                | (TypedValue::Json(_), FieldType::Json | FieldType::Multiselect)
        )
    }

    /// JSON rendering of the value, as a caller would have supplied it
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TypedValue::Text(s) => serde_json::Value::String(s.clone()),
            TypedValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            TypedValue::Boolean(b) => serde_json::Value::Bool(*b),
            TypedValue::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            TypedValue::Json(v) => v.clone(),
        }
    }
}

/// Declarative constraints attached to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Allow-list for text values and multiselect elements
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// JSON Schema for json fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Field definition evaluated by the validation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field_name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub rules: ValidationRules,
}

// ===== Paging =====

/// Offset/limit page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub offset: u64,
    /// Zero means "use the configured default"
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// A page of results with the total number of matches
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: u64,
}

// ===== Entities =====

/// Generic business object
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub entity_type: String,
    pub entity_name: String,
    pub entity_code: String,
    pub smart_code: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn is_archived(&self) -> bool {
        self.status == ARCHIVED_STATUS
    }
}

/// Input for creating an entity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewEntity {
    pub entity_type: String,
    pub entity_name: String,
    pub smart_code: String,
    /// Generated from the entity type when absent
    pub entity_code: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update of an entity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityPatch {
    /// Present only so that attempts to move a record between tenants can be rejected
    pub organization_id: Option<Uuid>,
    pub entity_name: Option<String>,
    pub entity_code: Option<String>,
    pub smart_code: Option<String>,
    pub status: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Entity query filter; the organization is always a separate argument
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    pub entity_code: Option<String>,
    pub smart_code: Option<String>,
    /// When absent, archived entities are excluded
    pub status: Option<String>,
}

/// What to hydrate alongside entities on read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityInclude {
    pub dynamic_data: bool,
    pub relationships: bool,
}

/// Entity with optional hydrated fields and outgoing relationships
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub entity: Entity,
    pub fields: Option<BTreeMap<String, TypedValue>>,
    pub relationships: Option<Vec<Relationship>>,
}

/// Dependent rows archived together with an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeOptions {
    pub dynamic_data: bool,
    pub relationships: bool,
}

impl CascadeOptions {
    pub fn all() -> Self {
        Self {
            dynamic_data: true,
            relationships: true,
        }
    }
}

// ===== Dynamic data =====

/// One stored EAV row
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicField {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub entity_id: Uuid,
    pub field_name: String,
    pub field_type: FieldType,
    pub value: TypedValue,
    pub smart_code: String,
    pub validation_rules: Option<ValidationRules>,
    pub is_required: bool,
    pub field_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for writing one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field_name: String,
    pub field_type: FieldType,
    /// Raw caller input, coerced according to `field_type`
    pub value: serde_json::Value,
    pub smart_code: String,
    /// Overrides rules registered for the entity's smart code
    pub rules: Option<ValidationRules>,
    pub is_required: bool,
    pub field_order: i32,
}

impl FieldWrite {
    pub fn new(
        field_name: impl Into<String>,
        field_type: FieldType,
        value: serde_json::Value,
        smart_code: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            value,
            smart_code: smart_code.into(),
            rules: None,
            is_required: false,
            field_order: 0,
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}

// ===== Relationships =====

/// Directed typed edge between two entities of the same organization
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relationship_type: String,
    pub relationship_data: serde_json::Value,
    pub smart_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an edge
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relationship_type: String,
    pub relationship_data: serde_json::Value,
    pub smart_code: String,
}

/// Edge query filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationshipFilter {
    pub from_entity_id: Option<Uuid>,
    pub to_entity_id: Option<Uuid>,
    pub relationship_type: Option<String>,
    pub include_inactive: bool,
}

/// Edge paired with the entity on its far end
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedRelationship {
    pub relationship: Relationship,
    pub linked_entity: Option<Entity>,
}

// ===== Transactions =====

/// Business event header
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionHeader {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub transaction_type: String,
    pub transaction_code: String,
    pub smart_code: String,
    pub status: String,
    pub total_amount: f64,
    pub source_entity_id: Option<Uuid>,
    pub target_entity_id: Option<Uuid>,
    pub transaction_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item of a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLine {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub transaction_id: Uuid,
    pub line_number: i32,
    pub line_type: String,
    pub entity_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_amount: f64,
    pub line_amount: f64,
    pub smart_code: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Header with its lines ordered by line number
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub header: TransactionHeader,
    pub lines: Vec<TransactionLine>,
}

/// Input for creating a transaction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTransaction {
    pub transaction_type: String,
    pub transaction_code: Option<String>,
    pub smart_code: String,
    pub status: Option<String>,
    /// Defaults to the sum of line amounts
    pub total_amount: Option<f64>,
    pub source_entity_id: Option<Uuid>,
    pub target_entity_id: Option<Uuid>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub lines: Vec<NewTransactionLine>,
}

/// Input for one transaction line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTransactionLine {
    pub line_number: i32,
    pub line_type: String,
    pub entity_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_amount: Option<f64>,
    pub line_amount: f64,
    pub smart_code: String,
    pub metadata: Option<serde_json::Value>,
}

/// Transaction header query filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<String>,
    pub smart_code: Option<String>,
    pub status: Option<String>,
    pub source_entity_id: Option<Uuid>,
    pub target_entity_id: Option<Uuid>,
}

// ===== Workflow =====

/// Flags carried by a `can_transition_to` edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionFlags {
    pub requires_approval: bool,
    /// Driven by an external scheduler, never by this crate
    pub automatic: bool,
    pub requires_action: bool,
    pub requires_confirmation: bool,
}

/// Stage placement carried by a `has_stage` edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageFlags {
    pub order: i32,
    pub is_initial: bool,
    pub is_final: bool,
}

/// Stage of a workflow definition
#[derive(Debug, Clone, PartialEq)]
pub struct StageDefinition {
    pub code: String,
    pub name: String,
    pub flags: StageFlags,
}

/// Legal move between two stage codes of a workflow definition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDefinition {
    pub from: String,
    pub to: String,
    pub flags: TransitionFlags,
}

/// Template, stages and transitions written by `define_workflow`
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub template_name: String,
    pub template_code: Option<String>,
    pub smart_code: String,
    pub stages: Vec<StageDefinition>,
    pub transitions: Vec<TransitionDefinition>,
}

/// Transition reachable from a record's current status
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableTransition {
    pub status: Entity,
    pub flags: TransitionFlags,
}

/// Who is asking for a status change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Actor {
    /// Identifier recorded in the audit entry
    pub actor_id: Option<Uuid>,
    /// Whether the actor may take transitions flagged `requires_approval`
    pub can_approve: bool,
}

impl Actor {
    /// Regular user without approval rights
    pub fn user(actor_id: Uuid) -> Self {
        Self {
            actor_id: Some(actor_id),
            can_approve: false,
        }
    }

    /// User allowed to take approval-gated transitions
    pub fn approver(actor_id: Uuid) -> Self {
        Self {
            actor_id: Some(actor_id),
            can_approve: true,
        }
    }

    /// Unattributed caller such as an external scheduler
    pub fn system() -> Self {
        Self::default()
    }
}
