use sea_orm::entity::prelude::*;

/// A login identity. Accounts are never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Login name, unique across the installation.
    #[sea_orm(unique)]
    pub account_name: String,
    /// Used to look the account up when inviting it into a household.
    #[sea_orm(unique)]
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// ISO 4217 currency code, e.g., "USD", "EUR".
    pub currency: String,
    pub created_at: Date,
    pub updated_at: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::person::Entity")]
    Person,
    #[sea_orm(has_many = "super::scope_access::Entity")]
    ScopeAccess,
    #[sea_orm(has_many = "super::category_target::Entity")]
    CategoryTarget,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl Related<super::scope_access::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScopeAccess.def()
    }
}

impl Related<super::scope::Entity> for Entity {
    fn to() -> RelationDef {
        super::scope_access::Relation::Scope.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::scope_access::Relation::Account.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
