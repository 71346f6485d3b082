//! create routes table migration

use sea_orm_migration::prelude::*;

use super::m20261001_000002_create_nodes::Nodes;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Routes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Routes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Routes::NodeId).big_integer().not_null())
                    .col(ColumnDef::new(Routes::Prefix).string().not_null())
                    .col(
                        ColumnDef::new(Routes::Advertised)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Routes::Enabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Routes::IsPrimary)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Routes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Routes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_routes_node")
                            .from(Routes::Table, Routes::NodeId)
                            .to(Nodes::Table, Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // a node offers each prefix at most once
        manager
            .create_index(
                Index::create()
                    .name("idx_routes_node_prefix")
                    .table(Routes::Table)
                    .col(Routes::NodeId)
                    .col(Routes::Prefix)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // other-offerer lookups during primary election
        manager
            .create_index(
                Index::create()
                    .name("idx_routes_prefix")
                    .table(Routes::Table)
                    .col(Routes::Prefix)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Routes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Routes {
    Table,
    Id,
    NodeId,
    Prefix,
    Advertised,
    Enabled,
    IsPrimary,
    CreatedAt,
    UpdatedAt,
}
