//! Entity to model mappers
//!
//! Conversions between SeaORM entities and contract models

use super::entity::{core_entity, dynamic_data, relationship, transaction, transaction_line};
use crate::contract::{
    DynamicField, Entity, FieldType, Relationship, TransactionHeader, TransactionLine, TypedValue,
    ValidationRules,
};
use anyhow::{anyhow, bail};
use sea_orm::ActiveValue::{NotSet, Set};

// ===== Entity Conversions =====

impl From<core_entity::Model> for Entity {
    fn from(m: core_entity::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            entity_type: m.entity_type,
            entity_name: m.entity_name,
            entity_code: m.entity_code,
            smart_code: m.smart_code,
            status: m.status,
            metadata: m.metadata,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<&Entity> for core_entity::ActiveModel {
    fn from(e: &Entity) -> Self {
        Self {
            id: Set(e.id),
            organization_id: Set(e.organization_id),
            entity_type: Set(e.entity_type.clone()),
            entity_name: Set(e.entity_name.clone()),
            entity_code: Set(e.entity_code.clone()),
            smart_code: Set(e.smart_code.clone()),
            status: Set(e.status.clone()),
            metadata: Set(e.metadata.clone()),
            created_at: Set(e.created_at),
            updated_at: Set(e.updated_at),
        }
    }
}

// ===== Dynamic Data Conversions =====

impl TryFrom<dynamic_data::Model> for DynamicField {
    type Error = anyhow::Error;

    fn try_from(m: dynamic_data::Model) -> Result<Self, Self::Error> {
        let field_type = FieldType::parse(&m.field_type)
            .ok_or_else(|| anyhow!("unknown field_type '{}' on row {}", m.field_type, m.id))?;

        let populated = [
            m.field_value_text.is_some(),
            m.field_value_number.is_some(),
            m.field_value_boolean.is_some(),
            m.field_value_date.is_some(),
            m.field_value_json.is_some(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count();
        if populated != 1 {
            bail!("row {} has {} populated value slots", m.id, populated);
        }

        let value = match field_type {
            FieldType::Text => m.field_value_text.map(TypedValue::Text),
            FieldType::Number => m.field_value_number.map(TypedValue::Number),
            FieldType::Boolean => m.field_value_boolean.map(TypedValue::Boolean),
            FieldType::Date => m.field_value_date.map(TypedValue::Date),
            FieldType::Json | FieldType::Multiselect => m.field_value_json.map(TypedValue::Json),
        }
        .ok_or_else(|| anyhow!("row {} does not populate the {} slot", m.id, field_type))?;

        let validation_rules = m
            .validation_rules
            .map(serde_json::from_value::<ValidationRules>)
            .transpose()?;

        Ok(Self {
            id: m.id,
            organization_id: m.organization_id,
            entity_id: m.entity_id,
            field_name: m.field_name,
            field_type,
            value,
            smart_code: m.smart_code,
            validation_rules,
            is_required: m.is_required,
            field_order: m.field_order,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl TryFrom<&DynamicField> for dynamic_data::ActiveModel {
    type Error = anyhow::Error;

    fn try_from(f: &DynamicField) -> Result<Self, Self::Error> {
        if !f.value.matches(f.field_type) {
            bail!("value does not match field type {}", f.field_type);
        }

        let mut active = Self {
            id: Set(f.id),
            organization_id: Set(f.organization_id),
            entity_id: Set(f.entity_id),
            field_name: Set(f.field_name.clone()),
            field_type: Set(f.field_type.as_str().to_string()),
            field_value_text: Set(None),
            field_value_number: Set(None),
            field_value_boolean: Set(None),
            field_value_date: Set(None),
            field_value_json: Set(None),
            smart_code: Set(f.smart_code.clone()),
            validation_rules: Set(f
                .validation_rules
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?),
            is_required: Set(f.is_required),
            field_order: Set(f.field_order),
            created_at: Set(f.created_at),
            updated_at: Set(f.updated_at),
            deleted_at: Set(None),
        };

        match &f.value {
            TypedValue::Text(s) => active.field_value_text = Set(Some(s.clone())),
            TypedValue::Number(n) => active.field_value_number = Set(Some(*n)),
            TypedValue::Boolean(b) => active.field_value_boolean = Set(Some(*b)),
            TypedValue::Date(d) => active.field_value_date = Set(Some(*d)),
            TypedValue::Json(v) => active.field_value_json = Set(Some(v.clone())),
        }

        Ok(active)
    }
}

// ===== Relationship Conversions =====

impl From<relationship::Model> for Relationship {
    fn from(m: relationship::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            from_entity_id: m.from_entity_id,
            to_entity_id: m.to_entity_id,
            relationship_type: m.relationship_type,
            relationship_data: m.relationship_data,
            smart_code: m.smart_code,
            is_active: m.is_active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<&Relationship> for relationship::ActiveModel {
    fn from(r: &Relationship) -> Self {
        Self {
            id: Set(r.id),
            organization_id: Set(r.organization_id),
            from_entity_id: Set(r.from_entity_id),
            to_entity_id: Set(r.to_entity_id),
            relationship_type: Set(r.relationship_type.clone()),
            relationship_data: Set(r.relationship_data.clone()),
            smart_code: Set(r.smart_code.clone()),
            is_active: Set(r.is_active),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        }
    }
}

// ===== Transaction Conversions =====

impl From<transaction::Model> for TransactionHeader {
    fn from(m: transaction::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            transaction_type: m.transaction_type,
            transaction_code: m.transaction_code,
            smart_code: m.smart_code,
            status: m.status,
            total_amount: m.total_amount,
            source_entity_id: m.source_entity_id,
            target_entity_id: m.target_entity_id,
            transaction_date: m.transaction_date,
            metadata: m.metadata,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<&TransactionHeader> for transaction::ActiveModel {
    fn from(h: &TransactionHeader) -> Self {
        Self {
            id: Set(h.id),
            organization_id: Set(h.organization_id),
            transaction_type: Set(h.transaction_type.clone()),
            transaction_code: Set(h.transaction_code.clone()),
            smart_code: Set(h.smart_code.clone()),
            status: Set(h.status.clone()),
            total_amount: Set(h.total_amount),
            source_entity_id: Set(h.source_entity_id),
            target_entity_id: Set(h.target_entity_id),
            transaction_date: Set(h.transaction_date),
            metadata: Set(h.metadata.clone()),
            created_at: Set(h.created_at),
            updated_at: Set(h.updated_at),
        }
    }
}

impl From<transaction_line::Model> for TransactionLine {
    fn from(m: transaction_line::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            transaction_id: m.transaction_id,
            line_number: m.line_number,
            line_type: m.line_type,
            entity_id: m.entity_id,
            description: m.description,
            quantity: m.quantity,
            unit_amount: m.unit_amount,
            line_amount: m.line_amount,
            smart_code: m.smart_code,
            metadata: m.metadata,
            created_at: m.created_at,
        }
    }
}

impl From<&TransactionLine> for transaction_line::ActiveModel {
    fn from(l: &TransactionLine) -> Self {
        Self {
            id: Set(l.id),
            organization_id: Set(l.organization_id),
            transaction_id: Set(l.transaction_id),
            line_number: Set(l.line_number),
            line_type: Set(l.line_type.clone()),
            entity_id: Set(l.entity_id),
            description: Set(l.description.clone()),
            quantity: Set(l.quantity),
            unit_amount: Set(l.unit_amount),
            line_amount: Set(l.line_amount),
            smart_code: Set(l.smart_code.clone()),
            metadata: Set(l.metadata.clone()),
            created_at: Set(l.created_at),
        }
    }
}

/// Active model that only touches the columns an entity update may change
pub fn entity_update_model(e: &Entity) -> core_entity::ActiveModel {
    core_entity::ActiveModel {
        id: Set(e.id),
        organization_id: NotSet,
        entity_type: NotSet,
        entity_name: Set(e.entity_name.clone()),
        entity_code: Set(e.entity_code.clone()),
        smart_code: Set(e.smart_code.clone()),
        status: Set(e.status.clone()),
        metadata: Set(e.metadata.clone()),
        created_at: NotSet,
        updated_at: Set(e.updated_at),
    }
}
