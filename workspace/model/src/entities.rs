//! SeaORM entities for the shared expense ledger.
//!
//! Data is partitioned by [`scope`]: every expense, category target and feed
//! connection belongs to exactly one scope, and accounts reach scopes through
//! [`scope_access`] rows.

pub mod account;
pub mod category_target;
pub mod expense;
pub mod feed_connection;
pub mod person;
pub mod scope;
pub mod scope_access;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::account::Entity as Account;
    pub use super::category_target::Entity as CategoryTarget;
    pub use super::expense::Entity as Expense;
    pub use super::feed_connection::Entity as FeedConnection;
    pub use super::person::Entity as Person;
    pub use super::scope::Entity as Scope;
    pub use super::scope_access::Entity as ScopeAccess;
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    async fn insert_account(db: &DatabaseConnection, name: &str) -> Result<account::Model, DbErr> {
        account::ActiveModel {
            account_name: Set(name.to_string()),
            email: Set(Some(format!("{name}@example.com"))),
            display_name: Set(None),
            currency: Set("USD".to_string()),
            created_at: Set(day()),
            updated_at: Set(day()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    fn feed_expense(scope_id: i32, account_ref: &str, transaction_ref: &str) -> expense::ActiveModel {
        expense::ActiveModel {
            scope_id: Set(scope_id),
            person_id: Set(None),
            day: Set(14),
            month: Set(3),
            year: Set(2025),
            expense_date: Set(day()),
            day_of_week: Set("Friday".to_string()),
            amount: Set(Decimal::new(1250, 2)),
            adjusted_amount: Set(Some(Decimal::new(1250, 2))),
            category: Set("Groceries".to_string()),
            suggested_category: Set(None),
            category_confirmed: Set(false),
            is_income: Set(false),
            currency: Set(Some("USD".to_string())),
            merchant_name: Set(Some("Corner Shop".to_string())),
            notes: Set(None),
            source_type: Set(expense::SourceType::Feed),
            external_account_id: Set(Some(account_ref.to_string())),
            external_transaction_id: Set(Some(transaction_ref.to_string())),
            created_at: Set(day()),
            updated_at: Set(day()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let alice = insert_account(&db, "alice").await?;
        let bob = insert_account(&db, "bob").await?;

        let household = scope::ActiveModel {
            name: Set("Smiths".to_string()),
            scope_type: Set(scope::ScopeType::Household),
            created_at: Set(day()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        for (account_id, access_type, status) in [
            (alice.id, scope_access::AccessType::Owner, scope_access::InviteStatus::Accepted),
            (bob.id, scope_access::AccessType::Member, scope_access::InviteStatus::Pending),
        ] {
            scope_access::ActiveModel {
                scope_id: Set(household.id),
                account_id: Set(account_id),
                access_type: Set(access_type),
                invite_status: Set(status),
                created_at: Set(day()),
                updated_at: Set(day()),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }

        let person = person::ActiveModel {
            account_id: Set(alice.id),
            name: Set("Alice".to_string()),
            created_at: Set(day()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let mut row = feed_expense(household.id, "acc-1", "txn-1");
        row.person_id = Set(Some(person.id));
        let stored = row.insert(&db).await?;
        assert_eq!(stored.amount, Decimal::new(1250, 2));
        assert_eq!(stored.source_type, expense::SourceType::Feed);

        // Accepted members only
        let accepted = ScopeAccess::find()
            .filter(scope_access::Column::ScopeId.eq(household.id))
            .filter(scope_access::Column::InviteStatus.eq(scope_access::InviteStatus::Accepted))
            .all(&db)
            .await?;
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].account_id, alice.id);

        let scopes_of_alice = alice.find_related(Scope).all(&db).await?;
        assert_eq!(scopes_of_alice.len(), 1);
        assert_eq!(scopes_of_alice[0].name, "Smiths");

        let expenses = household.find_related(Expense).all(&db).await?;
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].person_id, Some(person.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_external_pair_is_unique() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let scope = scope::ActiveModel {
            name: Set("Personal".to_string()),
            scope_type: Set(scope::ScopeType::Personal),
            created_at: Set(day()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        feed_expense(scope.id, "acc-1", "txn-1").insert(&db).await?;
        feed_expense(scope.id, "acc-1", "txn-2").insert(&db).await?;
        let duplicate = feed_expense(scope.id, "acc-1", "txn-1").insert(&db).await;
        assert!(duplicate.is_err());

        // Manual rows have no pair and never collide
        for _ in 0..2 {
            let mut manual = feed_expense(scope.id, "", "");
            manual.external_account_id = Set(None);
            manual.external_transaction_id = Set(None);
            manual.source_type = Set(expense::SourceType::Manual);
            manual.insert(&db).await?;
        }

        assert_eq!(Expense::find().all(&db).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_everything_else_target() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let alice = insert_account(&db, "alice").await?;
        let scope = scope::ActiveModel {
            name: Set("Personal".to_string()),
            scope_type: Set(scope::ScopeType::Personal),
            created_at: Set(day()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let target = category_target::ActiveModel {
            account_id: Set(alice.id),
            scope_id: Set(scope.id),
            category_name: Set(category_target::EVERYTHING_ELSE.to_string()),
            target_amount: Set(Decimal::new(300, 0)),
            is_active: Set(true),
            created_at: Set(day()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        assert!(target.is_everything_else());

        let found = CategoryTarget::find()
            .filter(category_target::Column::AccountId.eq(alice.id))
            .filter(category_target::Column::IsActive.eq(true))
            .all(&db)
            .await?;
        assert_eq!(found.len(), 1);
        Ok(())
    }
}
