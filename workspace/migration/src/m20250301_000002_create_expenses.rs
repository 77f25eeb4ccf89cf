use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_accounts_and_scopes::{Persons, Scopes};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(pk_auto(Expenses::Id))
                    .col(integer(Expenses::ScopeId))
                    .col(integer_null(Expenses::PersonId))
                    .col(integer(Expenses::Day))
                    .col(integer(Expenses::Month))
                    .col(integer(Expenses::Year))
                    .col(date(Expenses::ExpenseDate))
                    .col(string_len(Expenses::DayOfWeek, 10))
                    .col(decimal(Expenses::Amount).decimal_len(16, 4))
                    .col(decimal_null(Expenses::AdjustedAmount).decimal_len(16, 4))
                    .col(string(Expenses::Category))
                    .col(string_null(Expenses::SuggestedCategory))
                    .col(boolean(Expenses::CategoryConfirmed).default(false))
                    .col(boolean(Expenses::IsIncome).default(false))
                    .col(string_len_null(Expenses::Currency, 3))
                    .col(string_null(Expenses::MerchantName))
                    .col(string_null(Expenses::Notes))
                    .col(string_len(Expenses::SourceType, 20))
                    .col(string_null(Expenses::ExternalAccountId))
                    .col(string_null(Expenses::ExternalTransactionId))
                    .col(string_null(Expenses::FeedCategoryId))
                    .col(boolean_null(Expenses::FeedPending))
                    .col(string_null(Expenses::FeedPendingTransactionId))
                    .col(string_null(Expenses::FeedCategoryConfidence))
                    .col(string_null(Expenses::FeedCategoryPrimary))
                    .col(string_null(Expenses::FeedCategoryDetailed))
                    .col(string_null(Expenses::FeedMerchantName))
                    .col(string_null(Expenses::FeedName))
                    .col(string_null(Expenses::FeedTransactionType))
                    .col(date_null(Expenses::FeedAuthorizedDate))
                    .col(date(Expenses::CreatedAt))
                    .col(date(Expenses::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_scope")
                            .from(Expenses::Table, Expenses::ScopeId)
                            .to(Scopes::Table, Scopes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_person")
                            .from(Expenses::Table, Expenses::PersonId)
                            .to(Persons::Table, Persons::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Authoritative dedup guard for feed imports. NULL pairs (manual rows) never collide.
        manager
            .create_index(
                Index::create()
                    .name("idx_expense_external_pair")
                    .table(Expenses::Table)
                    .col(Expenses::ExternalAccountId)
                    .col(Expenses::ExternalTransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expense_scope_date")
                    .table(Expenses::Table)
                    .col(Expenses::ScopeId)
                    .col(Expenses::Year)
                    .col(Expenses::Month)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Expenses {
    Table,
    Id,
    ScopeId,
    PersonId,
    Day,
    Month,
    Year,
    ExpenseDate,
    DayOfWeek,
    Amount,
    AdjustedAmount,
    Category,
    SuggestedCategory,
    CategoryConfirmed,
    IsIncome,
    Currency,
    MerchantName,
    Notes,
    SourceType,
    ExternalAccountId,
    ExternalTransactionId,
    FeedCategoryId,
    FeedPending,
    FeedPendingTransactionId,
    FeedCategoryConfidence,
    FeedCategoryPrimary,
    FeedCategoryDetailed,
    FeedMerchantName,
    FeedName,
    FeedTransactionType,
    FeedAuthorizedDate,
    CreatedAt,
    UpdatedAt,
}
