use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_accounts_and_scopes::{Accounts, Scopes};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. Monthly category targets
        manager
            .create_table(
                Table::create()
                    .table(CategoryTargets::Table)
                    .if_not_exists()
                    .col(pk_auto(CategoryTargets::Id))
                    .col(integer(CategoryTargets::AccountId))
                    .col(integer(CategoryTargets::ScopeId))
                    .col(string(CategoryTargets::CategoryName))
                    .col(decimal(CategoryTargets::TargetAmount).decimal_len(16, 4))
                    .col(boolean(CategoryTargets::IsActive).default(true))
                    .col(date(CategoryTargets::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_category_target_account")
                            .from(CategoryTargets::Table, CategoryTargets::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_category_target_scope")
                            .from(CategoryTargets::Table, CategoryTargets::ScopeId)
                            .to(Scopes::Table, Scopes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_category_target_owner")
                    .table(CategoryTargets::Table)
                    .col(CategoryTargets::AccountId)
                    .col(CategoryTargets::ScopeId)
                    .col(CategoryTargets::IsActive)
                    .to_owned(),
            )
            .await?;

        // 2. External feed connections, one cursor each
        manager
            .create_table(
                Table::create()
                    .table(FeedConnections::Table)
                    .if_not_exists()
                    .col(pk_auto(FeedConnections::Id))
                    .col(integer(FeedConnections::ScopeId))
                    .col(string(FeedConnections::ItemId).unique_key())
                    .col(string(FeedConnections::AccessToken))
                    .col(string_null(FeedConnections::InstitutionId))
                    .col(string_null(FeedConnections::InstitutionName))
                    .col(text_null(FeedConnections::SyncCursor))
                    .col(date_time_null(FeedConnections::LastSynced))
                    .col(date(FeedConnections::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feed_connection_scope")
                            .from(FeedConnections::Table, FeedConnections::ScopeId)
                            .to(Scopes::Table, Scopes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeedConnections::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CategoryTargets::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum CategoryTargets {
    Table,
    Id,
    AccountId,
    ScopeId,
    CategoryName,
    TargetAmount,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum FeedConnections {
    Table,
    Id,
    ScopeId,
    ItemId,
    AccessToken,
    InstitutionId,
    InstitutionName,
    SyncCursor,
    LastSynced,
    CreatedAt,
}
