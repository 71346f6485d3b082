//! create nodes table migration

use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Nodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Nodes::MachineKey).var_binary(256).not_null())
                    .col(ColumnDef::new(Nodes::NodeKey).var_binary(256).not_null())
                    .col(ColumnDef::new(Nodes::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Nodes::Hostname).string().not_null())
                    .col(ColumnDef::new(Nodes::GivenName).string().not_null())
                    .col(
                        ColumnDef::new(Nodes::IpAddresses)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Nodes::ForcedTags)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Nodes::AuthKeyId).big_integer())
                    .col(
                        ColumnDef::new(Nodes::Ephemeral)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Nodes::Expiry).timestamp_with_time_zone())
                    .col(ColumnDef::new(Nodes::LastSeen).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Nodes::RegisterMethod)
                            .string()
                            .not_null()
                            .default("authkey"),
                    )
                    .col(
                        ColumnDef::new(Nodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Nodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_nodes_user")
                            .from(Nodes::Table, Nodes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // index on user_id for the per-user ephemeral sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_nodes_user_id")
                    .table(Nodes::Table)
                    .col(Nodes::UserId)
                    .to_owned(),
            )
            .await?;

        // one row per device
        manager
            .create_index(
                Index::create()
                    .name("idx_nodes_machine_key")
                    .table(Nodes::Table)
                    .col(Nodes::MachineKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // given names are unique at any instant
        manager
            .create_index(
                Index::create()
                    .name("idx_nodes_given_name")
                    .table(Nodes::Table)
                    .col(Nodes::GivenName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_nodes_node_key")
                    .table(Nodes::Table)
                    .col(Nodes::NodeKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Nodes {
    Table,
    Id,
    MachineKey,
    NodeKey,
    UserId,
    Hostname,
    GivenName,
    IpAddresses,
    ForcedTags,
    AuthKeyId,
    Ephemeral,
    Expiry,
    LastSeen,
    RegisterMethod,
    CreatedAt,
    UpdatedAt,
}
