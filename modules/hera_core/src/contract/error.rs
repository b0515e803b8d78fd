//! Contract error types for the HERA core
//!
//! These errors are transport-agnostic and used for inter-module communication.

use uuid::Uuid;

/// HERA core domain errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Failed coercion or validation, missing required field, malformed input
    #[error("Validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },
    /// Smart code does not match the HERA grammar
    #[error("Invalid smart code '{code}': {details}")]
    InvalidSmartCode {
        /// Rejected smart code
        code: String,
        /// Error details
        details: String,
    },
    /// Referenced entity belongs to another organization
    #[error("Entity {entity_id} does not belong to organization {organization_id}")]
    CrossTenant {
        /// Organization of the request
        organization_id: Uuid,
        /// Offending entity
        entity_id: Uuid,
    },
    /// Entity code already used by an active entity of the same type
    #[error("Duplicate entity code '{entity_code}' for entity type '{entity_type}'")]
    DuplicateCode {
        /// Entity type
        entity_type: String,
        /// Colliding code
        entity_code: String,
    },
    /// No `can_transition_to` edge between the two statuses
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition {
        /// Current status entity
        from: Uuid,
        /// Requested status entity
        to: Uuid,
    },
    /// Transition requires approval the actor does not have
    #[error("Transition from {from} to {to} requires approval")]
    ApprovalRequired {
        /// Current status entity
        from: Uuid,
        /// Requested status entity
        to: Uuid,
    },
    /// Resource not found in the organization
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource type (entity, relationship, transaction, ...)
        resource: String,
        /// Resource identifier
        id: String,
    },
    /// Storage failure; details are logged, not returned
    #[error("Internal error")]
    Internal,
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }
}
