pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_accounts_and_scopes;
mod m20250301_000002_create_expenses;
mod m20250315_000001_add_targets_and_feed_connections;
mod m20250401_000001_add_expense_feed_connection;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_accounts_and_scopes::Migration),
            Box::new(m20250301_000002_create_expenses::Migration),
            Box::new(m20250315_000001_add_targets_and_feed_connections::Migration),
            Box::new(m20250401_000001_add_expense_feed_connection::Migration),
        ]
    }
}
