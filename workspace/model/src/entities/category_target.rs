use sea_orm::entity::prelude::*;

/// Name of the catch-all bucket covering every category without its own target.
pub const EVERYTHING_ELSE: &str = "Everything Else";

/// A monthly spending ceiling an account sets for one category within one scope.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "category_targets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub account_id: i32,
    pub scope_id: i32,
    pub category_name: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub target_amount: Decimal,
    /// Superseded targets stay in the table with `is_active = false`.
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub created_at: Date,
}

impl Model {
    pub fn is_everything_else(&self) -> bool {
        self.category_name == EVERYTHING_ELSE
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::scope::Entity",
        from = "Column::ScopeId",
        to = "super::scope::Column::Id"
    )]
    Scope,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::scope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scope.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
