//! SeaORM entities for the fixed HERA table set

/// `core_entities` table
pub mod core_entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "core_entities")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub entity_type: String,
        pub entity_name: String,
        pub entity_code: String,
        pub smart_code: String,
        /// Denormalized lifecycle / workflow status
        pub status: String,
        pub metadata: Json,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::dynamic_data::Entity")]
        DynamicData,
    }

    impl Related<super::dynamic_data::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::DynamicData.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// `core_dynamic_data` table: one row per field, one populated value slot
pub mod dynamic_data {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "core_dynamic_data")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub entity_id: Uuid,
        pub field_name: String,
        pub field_type: String,
        pub field_value_text: Option<String>,
        pub field_value_number: Option<f64>,
        pub field_value_boolean: Option<bool>,
        pub field_value_date: Option<DateTimeUtc>,
        pub field_value_json: Option<Json>,
        pub smart_code: String,
        pub validation_rules: Option<Json>,
        pub is_required: bool,
        pub field_order: i32,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
        /// Soft delete timestamp
        pub deleted_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::core_entity::Entity",
            from = "Column::EntityId",
            to = "super::core_entity::Column::Id"
        )]
        CoreEntity,
    }

    impl Related<super::core_entity::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::CoreEntity.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// `core_relationships` table
pub mod relationship {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "core_relationships")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub from_entity_id: Uuid,
        pub to_entity_id: Uuid,
        pub relationship_type: String,
        pub relationship_data: Json,
        pub smart_code: String,
        pub is_active: bool,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// `universal_transactions` table
pub mod transaction {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "universal_transactions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub transaction_type: String,
        pub transaction_code: String,
        pub smart_code: String,
        pub status: String,
        pub total_amount: f64,
        pub source_entity_id: Option<Uuid>,
        pub target_entity_id: Option<Uuid>,
        pub transaction_date: DateTimeUtc,
        pub metadata: Json,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::transaction_line::Entity")]
        Lines,
    }

    impl Related<super::transaction_line::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Lines.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// `universal_transaction_lines` table
pub mod transaction_line {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "universal_transaction_lines")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
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
        pub metadata: Json,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::transaction::Entity",
            from = "Column::TransactionId",
            to = "super::transaction::Column::Id"
        )]
        Transaction,
    }

    impl Related<super::transaction::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Transaction.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}
