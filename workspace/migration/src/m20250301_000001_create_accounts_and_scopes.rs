use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create accounts table
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(pk_auto(Accounts::Id))
                    .col(string(Accounts::AccountName).unique_key())
                    .col(string_null(Accounts::Email).unique_key())
                    .col(string_null(Accounts::DisplayName))
                    .col(string_len(Accounts::Currency, 3).default("USD"))
                    .col(date(Accounts::CreatedAt))
                    .col(date(Accounts::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create persons table
        manager
            .create_table(
                Table::create()
                    .table(Persons::Table)
                    .if_not_exists()
                    .col(pk_auto(Persons::Id))
                    .col(integer(Persons::AccountId))
                    .col(string(Persons::Name))
                    .col(date(Persons::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_person_account")
                            .from(Persons::Table, Persons::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create scopes table
        manager
            .create_table(
                Table::create()
                    .table(Scopes::Table)
                    .if_not_exists()
                    .col(pk_auto(Scopes::Id))
                    .col(string(Scopes::Name))
                    .col(string_len(Scopes::ScopeType, 20))
                    .col(date(Scopes::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Create scope_access table
        manager
            .create_table(
                Table::create()
                    .table(ScopeAccess::Table)
                    .if_not_exists()
                    .col(pk_auto(ScopeAccess::Id))
                    .col(integer(ScopeAccess::ScopeId))
                    .col(integer(ScopeAccess::AccountId))
                    .col(string_len(ScopeAccess::AccessType, 20))
                    .col(string_len(ScopeAccess::InviteStatus, 20))
                    .col(date(ScopeAccess::CreatedAt))
                    .col(date(ScopeAccess::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scope_access_scope")
                            .from(ScopeAccess::Table, ScopeAccess::ScopeId)
                            .to(Scopes::Table, Scopes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scope_access_account")
                            .from(ScopeAccess::Table, ScopeAccess::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scope_access_scope_account")
                    .table(ScopeAccess::Table)
                    .col(ScopeAccess::ScopeId)
                    .col(ScopeAccess::AccountId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScopeAccess::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Scopes::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Persons::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Accounts {
    Table,
    Id,
    AccountName,
    Email,
    DisplayName,
    Currency,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Persons {
    Table,
    Id,
    AccountId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Scopes {
    Table,
    Id,
    Name,
    ScopeType,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ScopeAccess {
    #[sea_orm(iden = "scope_access")]
    Table,
    Id,
    ScopeId,
    AccountId,
    AccessType,
    InviteStatus,
    CreatedAt,
    UpdatedAt,
}
