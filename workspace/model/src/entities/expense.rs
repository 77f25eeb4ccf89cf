use sea_orm::entity::prelude::*;

/// Where an expense row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum SourceType {
    /// Entered by hand; never deduplicated.
    #[sea_orm(string_value = "manual")]
    Manual,
    /// Imported from the external transaction feed.
    #[sea_orm(string_value = "feed")]
    Feed,
}

/// A single ledger entry, owned by exactly one scope.
///
/// Feed-sourced rows carry the `(external_account_id, external_transaction_id)`
/// pair, which is unique across the table whenever both halves are present.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scope_id: i32,
    /// `None` means the expense is joint.
    pub person_id: Option<i32>,
    pub day: i32,
    /// Calendar month, 1-12.
    pub month: i32,
    pub year: i32,
    pub expense_date: Date,
    pub day_of_week: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub adjusted_amount: Option<Decimal>,
    pub category: String,
    pub suggested_category: Option<String>,
    pub category_confirmed: bool,
    pub is_income: bool,
    pub currency: Option<String>,
    pub merchant_name: Option<String>,
    pub notes: Option<String>,
    pub source_type: SourceType,

    // Provider identity and metadata, only present for feed rows.
    /// Connection whose sync delivered the row; `None` for direct imports.
    pub feed_connection_id: Option<i32>,
    pub external_account_id: Option<String>,
    pub external_transaction_id: Option<String>,
    pub feed_category_id: Option<String>,
    pub feed_pending: Option<bool>,
    pub feed_pending_transaction_id: Option<String>,
    pub feed_category_confidence: Option<String>,
    pub feed_category_primary: Option<String>,
    pub feed_category_detailed: Option<String>,
    pub feed_merchant_name: Option<String>,
    pub feed_name: Option<String>,
    pub feed_transaction_type: Option<String>,
    pub feed_authorized_date: Option<Date>,

    pub created_at: Date,
    pub updated_at: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scope::Entity",
        from = "Column::ScopeId",
        to = "super::scope::Column::Id"
    )]
    Scope,
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::Id"
    )]
    Person,
}

impl Related<super::scope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scope.def()
    }
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
