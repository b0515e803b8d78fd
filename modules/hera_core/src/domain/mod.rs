//! Domain layer - business logic and services

pub mod registry;
pub mod repository;
pub mod service;
pub mod smart_code;
pub mod value;
pub mod workflow;

pub use registry::{CompiledPolicy, SmartCodePolicy, SmartCodeRegistry};
pub use repository::{
    DynamicDataRepository, EntityRepository, RelationshipRepository, StatusChange,
    TransactionRepository, WorkflowRecords, WorkflowRepository,
};
pub use service::Service;
pub use smart_code::SmartCode;
pub use workflow::{WorkflowDefinitionError, WorkflowGraph};
