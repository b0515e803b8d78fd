//! Database migrations for the HERA core tables
//!
//! Every migration lives in this file, so each one names itself explicitly;
//! the derived name would be the file name for all of them.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_core_entities::Migration),
            Box::new(m20250101_000002_create_core_dynamic_data::Migration),
            Box::new(m20250101_000003_create_core_relationships::Migration),
            Box::new(m20250101_000004_create_universal_transactions::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum CoreEntities {
    Table,
    Id,
    OrganizationId,
    EntityType,
    EntityName,
    EntityCode,
    SmartCode,
    Status,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UniversalTransactions {
    Table,
    Id,
    OrganizationId,
    TransactionType,
    TransactionCode,
    SmartCode,
    Status,
    TotalAmount,
    SourceEntityId,
    TargetEntityId,
    TransactionDate,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

fn timestamp_now<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

mod m20250101_000001_create_core_entities {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_core_entities"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CoreEntities::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CoreEntities::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(CoreEntities::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(CoreEntities::EntityType).string().not_null())
                        .col(ColumnDef::new(CoreEntities::EntityName).string().not_null())
                        .col(ColumnDef::new(CoreEntities::EntityCode).string().not_null())
                        .col(ColumnDef::new(CoreEntities::SmartCode).string().not_null())
                        .col(ColumnDef::new(CoreEntities::Status).string().not_null())
                        .col(ColumnDef::new(CoreEntities::Metadata).json().not_null())
                        .col(timestamp_now(CoreEntities::CreatedAt))
                        .col(timestamp_now(CoreEntities::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            // Uniqueness of codes only applies to non-archived rows, so this index is not unique
            manager
                .create_index(
                    Index::create()
                        .name("idx_core_entities_org_type_code")
                        .table(CoreEntities::Table)
                        .col(CoreEntities::OrganizationId)
                        .col(CoreEntities::EntityType)
                        .col(CoreEntities::EntityCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_core_entities_org_smart_code")
                        .table(CoreEntities::Table)
                        .col(CoreEntities::OrganizationId)
                        .col(CoreEntities::SmartCode)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CoreEntities::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000002_create_core_dynamic_data {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_core_dynamic_data"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CoreDynamicData::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CoreDynamicData::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(CoreDynamicData::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(CoreDynamicData::EntityId).uuid().not_null())
                        .col(ColumnDef::new(CoreDynamicData::FieldName).string().not_null())
                        .col(ColumnDef::new(CoreDynamicData::FieldType).string().not_null())
                        .col(ColumnDef::new(CoreDynamicData::FieldValueText).text())
                        .col(ColumnDef::new(CoreDynamicData::FieldValueNumber).double())
                        .col(ColumnDef::new(CoreDynamicData::FieldValueBoolean).boolean())
                        .col(ColumnDef::new(CoreDynamicData::FieldValueDate).timestamp_with_time_zone())
                        .col(ColumnDef::new(CoreDynamicData::FieldValueJson).json())
                        .col(ColumnDef::new(CoreDynamicData::SmartCode).string().not_null())
                        .col(ColumnDef::new(CoreDynamicData::ValidationRules).json())
                        .col(
                            ColumnDef::new(CoreDynamicData::IsRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CoreDynamicData::FieldOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(timestamp_now(CoreDynamicData::CreatedAt))
                        .col(timestamp_now(CoreDynamicData::UpdatedAt))
                        .col(ColumnDef::new(CoreDynamicData::DeletedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_core_dynamic_data_entity")
                                .from(CoreDynamicData::Table, CoreDynamicData::EntityId)
                                .to(CoreEntities::Table, CoreEntities::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_core_dynamic_data_entity_field")
                        .table(CoreDynamicData::Table)
                        .col(CoreDynamicData::EntityId)
                        .col(CoreDynamicData::FieldName)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_core_dynamic_data_org")
                        .table(CoreDynamicData::Table)
                        .col(CoreDynamicData::OrganizationId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CoreDynamicData::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CoreDynamicData {
        Table,
        Id,
        OrganizationId,
        EntityId,
        FieldName,
        FieldType,
        FieldValueText,
        FieldValueNumber,
        FieldValueBoolean,
        FieldValueDate,
        FieldValueJson,
        SmartCode,
        ValidationRules,
        IsRequired,
        FieldOrder,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20250101_000003_create_core_relationships {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_core_relationships"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CoreRelationships::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CoreRelationships::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(CoreRelationships::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(CoreRelationships::FromEntityId).uuid().not_null())
                        .col(ColumnDef::new(CoreRelationships::ToEntityId).uuid().not_null())
                        .col(ColumnDef::new(CoreRelationships::RelationshipType).string().not_null())
                        .col(ColumnDef::new(CoreRelationships::RelationshipData).json().not_null())
                        .col(ColumnDef::new(CoreRelationships::SmartCode).string().not_null())
                        .col(
                            ColumnDef::new(CoreRelationships::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(timestamp_now(CoreRelationships::CreatedAt))
                        .col(timestamp_now(CoreRelationships::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_core_relationships_from")
                                .from(CoreRelationships::Table, CoreRelationships::FromEntityId)
                                .to(CoreEntities::Table, CoreEntities::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_core_relationships_to")
                                .from(CoreRelationships::Table, CoreRelationships::ToEntityId)
                                .to(CoreEntities::Table, CoreEntities::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_core_relationships_from_type")
                        .table(CoreRelationships::Table)
                        .col(CoreRelationships::FromEntityId)
                        .col(CoreRelationships::RelationshipType)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_core_relationships_to_type")
                        .table(CoreRelationships::Table)
                        .col(CoreRelationships::ToEntityId)
                        .col(CoreRelationships::RelationshipType)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CoreRelationships::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CoreRelationships {
        Table,
        Id,
        OrganizationId,
        FromEntityId,
        ToEntityId,
        RelationshipType,
        RelationshipData,
        SmartCode,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000004_create_universal_transactions {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_universal_transactions"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UniversalTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UniversalTransactions::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(UniversalTransactions::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(UniversalTransactions::TransactionType).string().not_null())
                        .col(ColumnDef::new(UniversalTransactions::TransactionCode).string().not_null())
                        .col(ColumnDef::new(UniversalTransactions::SmartCode).string().not_null())
                        .col(ColumnDef::new(UniversalTransactions::Status).string().not_null())
                        .col(
                            ColumnDef::new(UniversalTransactions::TotalAmount)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(ColumnDef::new(UniversalTransactions::SourceEntityId).uuid())
                        .col(ColumnDef::new(UniversalTransactions::TargetEntityId).uuid())
                        .col(timestamp_now(UniversalTransactions::TransactionDate))
                        .col(ColumnDef::new(UniversalTransactions::Metadata).json().not_null())
                        .col(timestamp_now(UniversalTransactions::CreatedAt))
                        .col(timestamp_now(UniversalTransactions::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_universal_transactions_org_type")
                        .table(UniversalTransactions::Table)
                        .col(UniversalTransactions::OrganizationId)
                        .col(UniversalTransactions::TransactionType)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UniversalTransactionLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UniversalTransactionLines::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(UniversalTransactionLines::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(UniversalTransactionLines::TransactionId).uuid().not_null())
                        .col(ColumnDef::new(UniversalTransactionLines::LineNumber).integer().not_null())
                        .col(ColumnDef::new(UniversalTransactionLines::LineType).string().not_null())
                        .col(ColumnDef::new(UniversalTransactionLines::EntityId).uuid())
                        .col(ColumnDef::new(UniversalTransactionLines::Description).text())
                        .col(
                            ColumnDef::new(UniversalTransactionLines::Quantity)
                                .double()
                                .not_null()
                                .default(1.0),
                        )
                        .col(
                            ColumnDef::new(UniversalTransactionLines::UnitAmount)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(UniversalTransactionLines::LineAmount)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(ColumnDef::new(UniversalTransactionLines::SmartCode).string().not_null())
                        .col(ColumnDef::new(UniversalTransactionLines::Metadata).json().not_null())
                        .col(timestamp_now(UniversalTransactionLines::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_universal_transaction_lines_header")
                                .from(
                                    UniversalTransactionLines::Table,
                                    UniversalTransactionLines::TransactionId,
                                )
                                .to(UniversalTransactions::Table, UniversalTransactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_universal_transaction_lines_number")
                        .table(UniversalTransactionLines::Table)
                        .col(UniversalTransactionLines::TransactionId)
                        .col(UniversalTransactionLines::LineNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UniversalTransactionLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UniversalTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum UniversalTransactionLines {
        Table,
        Id,
        OrganizationId,
        TransactionId,
        LineNumber,
        LineType,
        EntityId,
        Description,
        Quantity,
        UnitAmount,
        LineAmount,
        SmartCode,
        Metadata,
        CreatedAt,
    }
}
