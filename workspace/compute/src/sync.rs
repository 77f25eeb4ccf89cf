//! Cursor-based synchronisation of linked feed connections into the ledger.

use chrono::Utc;
use common::{FeedTransaction, SyncResult};
use model::entities::{expense, feed_connection, scope};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::access::{accessible_scopes, require_scope_access};
use crate::error::{ComputeError, Result};
use crate::feed::TransactionFeed;
use crate::ledger::ingest_within;

/// Upper bound on pages fetched in one sync run.
pub const MAX_SYNC_PAGES: usize = 50;

/// Details of a newly linked institution.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConnection {
    pub scope_id: i32,
    pub item_id: String,
    pub access_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSummary {
    pub connection: feed_connection::Model,
    pub scope_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStatus {
    pub has_connections: bool,
    pub connection_count: u64,
    pub feed_transaction_count: u64,
}

async fn find_connection<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    item_id: &str,
) -> Result<feed_connection::Model> {
    let connection = feed_connection::Entity::find()
        .filter(feed_connection::Column::ItemId.eq(item_id))
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("Connection {item_id} not found")))?;
    require_scope_access(db, account_id, connection.scope_id).await?;
    Ok(connection)
}

/// Pulls every pending page for `item_id`, then stores the new cursor and the added
/// transactions in a single database transaction.
#[instrument(skip(db, feed))]
pub async fn sync_connection(
    db: &DatabaseConnection,
    feed: &dyn TransactionFeed,
    account_id: i32,
    item_id: &str,
) -> Result<SyncResult> {
    let connection = find_connection(db, account_id, item_id).await?;

    let mut cursor = connection.sync_cursor.clone().filter(|c| !c.is_empty());
    let mut added: Vec<FeedTransaction> = Vec::new();
    let mut modified = 0;
    let mut removed = 0;
    let mut pages = 0;

    loop {
        let page = feed.sync_page(&connection.access_token, cursor.as_deref()).await?;
        pages += 1;
        debug!(page = pages, added = page.added.len(), has_more = page.has_more, "Sync page fetched");

        added.extend(page.added);
        modified += page.modified.len();
        removed += page.removed.len();
        cursor = Some(page.next_cursor);

        if !page.has_more {
            break;
        }
        if pages >= MAX_SYNC_PAGES {
            warn!(item_id, pages, "Sync page limit reached, resuming from saved cursor next run");
            break;
        }
    }

    let cursor = cursor.unwrap_or_default();
    let txn = db.begin().await?;
    let mut active: feed_connection::ActiveModel = connection.clone().into();
    active.sync_cursor = Set(Some(cursor.clone()));
    active.last_synced = Set(Some(Utc::now().naive_utc()));
    active.update(&txn).await?;
    let summary = ingest_within(&txn, connection.scope_id, Some(connection.id), &added).await?;
    txn.commit().await?;

    info!(
        item_id,
        pages,
        added = added.len(),
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Connection synced"
    );

    Ok(SyncResult {
        added: added.len(),
        modified,
        removed,
        inserted: summary.inserted,
        skipped: summary.skipped,
        cursor,
        institution_name: connection.institution_name,
    })
}

/// Links an institution to a scope. Re-registering an item refreshes its token and
/// institution details but keeps the cursor.
#[instrument(skip(db, new_connection), fields(item_id = %new_connection.item_id, scope_id = new_connection.scope_id))]
pub async fn register_connection(
    db: &DatabaseConnection,
    account_id: i32,
    new_connection: NewConnection,
) -> Result<feed_connection::Model> {
    if new_connection.item_id.trim().is_empty() || new_connection.access_token.trim().is_empty() {
        return Err(ComputeError::Validation(
            "item_id and access_token must not be empty".to_string(),
        ));
    }
    require_scope_access(db, account_id, new_connection.scope_id).await?;

    let existing = feed_connection::Entity::find()
        .filter(feed_connection::Column::ItemId.eq(&new_connection.item_id))
        .one(db)
        .await?;

    let stored = match existing {
        Some(current) => {
            require_scope_access(db, account_id, current.scope_id).await?;
            let mut active: feed_connection::ActiveModel = current.into();
            active.scope_id = Set(new_connection.scope_id);
            active.access_token = Set(new_connection.access_token);
            active.institution_id = Set(new_connection.institution_id);
            active.institution_name = Set(new_connection.institution_name);
            let updated = active.update(db).await?;
            info!(connection_id = updated.id, "Connection credentials refreshed");
            updated
        }
        None => {
            let created = feed_connection::ActiveModel {
                scope_id: Set(new_connection.scope_id),
                item_id: Set(new_connection.item_id),
                access_token: Set(new_connection.access_token),
                institution_id: Set(new_connection.institution_id),
                institution_name: Set(new_connection.institution_name),
                sync_cursor: Set(None),
                last_synced: Set(None),
                created_at: Set(Utc::now().date_naive()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            info!(connection_id = created.id, "Connection registered");
            created
        }
    };

    Ok(stored)
}

/// Connections in every scope the account can reach.
pub async fn list_connections<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<ConnectionSummary>> {
    let scopes = accessible_scopes(db, account_id).await?;
    let rows = feed_connection::Entity::find()
        .filter(feed_connection::Column::ScopeId.is_in(scopes.iter().copied()))
        .order_by_asc(feed_connection::Column::Id)
        .find_also_related(scope::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(connection, scope)| ConnectionSummary {
            scope_name: scope.map(|s| s.name).unwrap_or_default(),
            connection,
        })
        .collect())
}

/// Unlinks a connection. With `delete_transactions`, the expenses its syncs delivered go
/// too; rows from other connections or direct imports are untouched. Returns the number
/// of expenses deleted.
#[instrument(skip(db))]
pub async fn remove_connection(
    db: &DatabaseConnection,
    account_id: i32,
    item_id: &str,
    delete_transactions: bool,
) -> Result<u64> {
    let txn = db.begin().await?;
    let connection = find_connection(&txn, account_id, item_id).await?;

    let deleted = if delete_transactions {
        expense::Entity::delete_many()
            .filter(expense::Column::FeedConnectionId.eq(connection.id))
            .exec(&txn)
            .await?
            .rows_affected
    } else {
        // Kept rows stop pointing at the removed connection
        expense::Entity::update_many()
            .col_expr(expense::Column::FeedConnectionId, Expr::value(Option::<i32>::None))
            .filter(expense::Column::FeedConnectionId.eq(connection.id))
            .exec(&txn)
            .await?;
        0
    };
    feed_connection::Entity::delete_by_id(connection.id).exec(&txn).await?;
    txn.commit().await?;

    info!(item_id, deleted, "Connection removed");
    Ok(deleted)
}

pub async fn feed_status<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<FeedStatus> {
    let scopes = accessible_scopes(db, account_id).await?;

    let connection_count = feed_connection::Entity::find()
        .filter(feed_connection::Column::ScopeId.is_in(scopes.iter().copied()))
        .count(db)
        .await?;
    let feed_transaction_count = expense::Entity::find()
        .filter(expense::Column::ScopeId.is_in(scopes.iter().copied()))
        .filter(expense::Column::SourceType.eq(expense::SourceType::Feed))
        .count(db)
        .await?;

    Ok(FeedStatus {
        has_connections: connection_count > 0,
        connection_count,
        feed_transaction_count,
    })
}
