use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_sectors_and_users::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_request_tables::Migration),
            Box::new(m20240301_000004_create_receiving_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_sectors_and_users {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_sectors_and_users"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sectors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sectors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sectors::Name).string().not_null())
                        .col(
                            ColumnDef::new(Sectors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sectors::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sectors::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(20).not_null())
                        .col(ColumnDef::new(Users::SectorId).uuid().not_null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_users_sector_id")
                                .from(Users::Table, Users::SectorId)
                                .to(Sectors::Table, Sectors::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_email")
                        .table(Users::Table)
                        .col(Users::Email)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sectors_name")
                        .table(Sectors::Table)
                        .col(Sectors::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sectors::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Sectors {
        Table,
        Id,
        Name,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Role,
        SectorId,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240301_000002_create_catalog_tables {
    use super::m20240301_000001_create_sectors_and_users::Sectors;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Unit).string_len(50).not_null())
                        .col(ColumnDef::new(Products::SectorId).uuid().not_null())
                        .col(
                            ColumnDef::new(Products::Status)
                                .string_len(20)
                                .not_null()
                                .default("available"),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_sector_id")
                                .from(Products::Table, Products::SectorId)
                                .to(Sectors::Table, Sectors::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_sector_id")
                        .table(Products::Table)
                        .col(Products::SectorId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::Cnpj).string_len(20).null())
                        .col(ColumnDef::new(Suppliers::Contact).string().null())
                        .col(ColumnDef::new(Suppliers::Phone).string_len(30).null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::Observations).text().null())
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Name,
        Description,
        Unit,
        SectorId,
        Status,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Suppliers {
        Table,
        Id,
        Name,
        Cnpj,
        Contact,
        Phone,
        Email,
        Observations,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240301_000003_create_request_tables {
    use super::m20240301_000001_create_sectors_and_users::{Sectors, Users};
    use super::m20240301_000002_create_catalog_tables::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_request_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::RequesterId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseRequests::SectorId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseRequests::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Priority)
                                .string_len(20)
                                .not_null()
                                .default("normal"),
                        )
                        .col(ColumnDef::new(PurchaseRequests::PriorityBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::PriorityAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::PriorityNotes).text().null())
                        .col(ColumnDef::new(PurchaseRequests::Observations).text().null())
                        .col(ColumnDef::new(PurchaseRequests::AdminNotes).text().null())
                        .col(ColumnDef::new(PurchaseRequests::ReviewedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::ReviewedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::CompletionNotes)
                                .text()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::CompletedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_requests_requester_id")
                                .from(PurchaseRequests::Table, PurchaseRequests::RequesterId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_requests_sector_id")
                                .from(PurchaseRequests::Table, PurchaseRequests::SectorId)
                                .to(Sectors::Table, Sectors::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_requests_requester_id")
                        .table(PurchaseRequests::Table)
                        .col(PurchaseRequests::RequesterId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_requests_status")
                        .table(PurchaseRequests::Table)
                        .col(PurchaseRequests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequestItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequestItems::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(RequestItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(RequestItems::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(RequestItems::AdminNotes).text().null())
                        .col(ColumnDef::new(RequestItems::SuspensionReason).text().null())
                        .col(
                            ColumnDef::new(RequestItems::Deadline)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RequestItems::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(RequestItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequestItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequestItems::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_items_purchase_request_id")
                                .from(RequestItems::Table, RequestItems::PurchaseRequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_items_product_id")
                                .from(RequestItems::Table, RequestItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_request_items_purchase_request_id")
                        .table(RequestItems::Table)
                        .col(RequestItems::PurchaseRequestId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequestItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseRequests {
        Table,
        Id,
        RequesterId,
        SectorId,
        Status,
        Priority,
        PriorityBy,
        PriorityAt,
        PriorityNotes,
        Observations,
        AdminNotes,
        ReviewedBy,
        ReviewedAt,
        CompletionNotes,
        CompletedBy,
        CompletedAt,
        Version,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum RequestItems {
        Table,
        Id,
        PurchaseRequestId,
        ProductId,
        Quantity,
        Status,
        AdminNotes,
        SuspensionReason,
        Deadline,
        Version,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240301_000004_create_receiving_tables {
    use super::m20240301_000002_create_catalog_tables::Suppliers;
    use super::m20240301_000003_create_request_tables::{PurchaseRequests, RequestItems};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_receiving_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ItemReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemReceipts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemReceipts::RequestItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(ItemReceipts::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemReceipts::ReceivedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(ItemReceipts::QuantityReceived)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemReceipts::RejectedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemReceipts::ReceiptCondition)
                                .string_len(20)
                                .not_null()
                                .default("good"),
                        )
                        .col(
                            ColumnDef::new(ItemReceipts::InvoiceNumber)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemReceipts::InvoiceDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ItemReceipts::LotNumber).string_len(100).null())
                        .col(
                            ColumnDef::new(ItemReceipts::ExpirationDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ItemReceipts::SupplierId).uuid().null())
                        .col(
                            ColumnDef::new(ItemReceipts::QualityChecked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ItemReceipts::QualityNotes).text().null())
                        .col(ColumnDef::new(ItemReceipts::Notes).text().null())
                        .col(ColumnDef::new(ItemReceipts::AttachmentPath).string().null())
                        .col(
                            ColumnDef::new(ItemReceipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemReceipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemReceipts::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_receipts_request_item_id")
                                .from(ItemReceipts::Table, ItemReceipts::RequestItemId)
                                .to(RequestItems::Table, RequestItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_receipts_supplier_id")
                                .from(ItemReceipts::Table, ItemReceipts::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_item_receipts_request_item_id")
                        .table(ItemReceipts::Table)
                        .col(ItemReceipts::RequestItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_item_receipts_purchase_request_id")
                        .table(ItemReceipts::Table)
                        .col(ItemReceipts::PurchaseRequestId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemBudgets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemBudgets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemBudgets::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemBudgets::RequestItemId).uuid().not_null())
                        .col(ColumnDef::new(ItemBudgets::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(ItemBudgets::UnitPrice)
                                .decimal_len(14, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemBudgets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemBudgets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemBudgets::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_budgets_purchase_request_id")
                                .from(ItemBudgets::Table, ItemBudgets::PurchaseRequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_budgets_request_item_id")
                                .from(ItemBudgets::Table, ItemBudgets::RequestItemId)
                                .to(RequestItems::Table, RequestItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_budgets_supplier_id")
                                .from(ItemBudgets::Table, ItemBudgets::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_item_budgets_purchase_request_id")
                        .table(ItemBudgets::Table)
                        .col(ItemBudgets::PurchaseRequestId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemBudgets::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ItemReceipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ItemReceipts {
        Table,
        Id,
        RequestItemId,
        PurchaseRequestId,
        ReceivedBy,
        QuantityReceived,
        RejectedQuantity,
        ReceiptCondition,
        InvoiceNumber,
        InvoiceDate,
        LotNumber,
        ExpirationDate,
        SupplierId,
        QualityChecked,
        QualityNotes,
        Notes,
        AttachmentPath,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum ItemBudgets {
        Table,
        Id,
        PurchaseRequestId,
        RequestItemId,
        SupplierId,
        UnitPrice,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
