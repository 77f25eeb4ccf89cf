use sea_orm::entity::prelude::*;

/// Whether a scope belongs to a single account or is shared by a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ScopeType {
    #[sea_orm(string_value = "personal")]
    Personal,
    #[sea_orm(string_value = "household")]
    Household,
}

/// Isolation boundary for expense records.
///
/// Every account owns exactly one personal scope; household scopes are shared
/// through [`super::scope_access`] rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scopes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub scope_type: ScopeType,
    pub created_at: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::scope_access::Entity")]
    ScopeAccess,
    #[sea_orm(has_many = "super::expense::Entity")]
    Expense,
    #[sea_orm(has_many = "super::category_target::Entity")]
    CategoryTarget,
    #[sea_orm(has_many = "super::feed_connection::Entity")]
    FeedConnection,
}

impl Related<super::scope_access::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScopeAccess.def()
    }
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expense.def()
    }
}

impl Related<super::feed_connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeedConnection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
