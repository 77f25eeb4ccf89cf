use sea_orm::entity::prelude::*;

/// A linked institution on the external transaction feed.
///
/// Each connection keeps its own access token and sync cursor, and imports into
/// exactly one scope.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "feed_connections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scope_id: i32,
    /// Provider-side identifier of the linked item.
    #[sea_orm(unique)]
    pub item_id: String,
    pub access_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    /// Opaque position in the provider's change stream. `None` syncs from the start.
    pub sync_cursor: Option<String>,
    pub last_synced: Option<DateTime>,
    pub created_at: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scope::Entity",
        from = "Column::ScopeId",
        to = "super::scope::Column::Id"
    )]
    Scope,
}

impl Related<super::scope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scope.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
