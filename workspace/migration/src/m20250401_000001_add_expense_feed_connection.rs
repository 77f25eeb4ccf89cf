use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Connection that delivered a feed row; NULL for manual rows and direct imports
        manager
            .alter_table(
                Table::alter()
                    .table(Alias::new("expenses"))
                    .add_column(ColumnDef::new(Alias::new("feed_connection_id")).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expense_feed_connection")
                    .table(Alias::new("expenses"))
                    .col(Alias::new("feed_connection_id"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_expense_feed_connection")
                    .table(Alias::new("expenses"))
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Alias::new("expenses"))
                    .drop_column(Alias::new("feed_connection_id"))
                    .to_owned(),
            )
            .await
    }
}
