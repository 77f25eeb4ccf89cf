//! Scope-based access control.
//!
//! An account may read and write the expenses of a scope only while it holds an
//! `accepted` [`scope_access`] row for it. Household membership moves through
//! `pending -> accepted | rejected` and never leaves a resolved state.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use model::entities::{
    account, person, scope,
    scope::ScopeType,
    scope_access::{self, AccessType, InviteStatus},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ComputeError, Result};

/// Fields needed to register a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub account_name: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub currency: String,
}

/// A scope the caller can use, together with the caller's role on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSummary {
    pub scope: scope::Model,
    pub access_type: AccessType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingInvite {
    pub scope_id: i32,
    pub scope_name: String,
    /// Email of the household owner, when they registered one.
    pub invited_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeMember {
    pub account_id: i32,
    pub account_name: String,
    pub email: Option<String>,
    pub access_type: AccessType,
    pub invite_status: InviteStatus,
}

/// Scopes the account holds accepted access to.
pub async fn accessible_scopes<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<BTreeSet<i32>> {
    let scope_ids: Vec<i32> = scope_access::Entity::find()
        .select_only()
        .column(scope_access::Column::ScopeId)
        .filter(scope_access::Column::AccountId.eq(account_id))
        .filter(scope_access::Column::InviteStatus.eq(InviteStatus::Accepted))
        .into_tuple()
        .all(db)
        .await?;

    Ok(scope_ids.into_iter().collect())
}

/// Fails with [`ComputeError::Forbidden`] unless the account has accepted access to `scope_id`.
pub async fn require_scope_access<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    scope_id: i32,
) -> Result<scope_access::Model> {
    scope_access::Entity::find()
        .filter(scope_access::Column::ScopeId.eq(scope_id))
        .filter(scope_access::Column::AccountId.eq(account_id))
        .filter(scope_access::Column::InviteStatus.eq(InviteStatus::Accepted))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!(account_id, scope_id, "Scope access denied");
            ComputeError::Forbidden(format!("No access to scope {scope_id}"))
        })
}

/// Narrows the accessible set to one explicitly requested scope, or returns all of them.
pub async fn resolve_scopes<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    requested: Option<i32>,
) -> Result<BTreeSet<i32>> {
    match requested {
        Some(scope_id) => {
            require_scope_access(db, account_id, scope_id).await?;
            Ok(BTreeSet::from([scope_id]))
        }
        None => accessible_scopes(db, account_id).await,
    }
}

/// Creates an account together with its default person and personal scope.
#[instrument(skip(db))]
pub async fn provision_account(db: &DatabaseConnection, new_account: NewAccount) -> Result<account::Model> {
    let account_name = new_account.account_name.trim().to_string();
    if account_name.is_empty() {
        return Err(ComputeError::Validation("Account name must not be empty".to_string()));
    }
    let currency = new_account.currency.trim().to_uppercase();
    if rusty_money::iso::find(&currency).is_none() {
        return Err(ComputeError::Validation(format!("Unknown currency code '{currency}'")));
    }
    let email = new_account
        .email
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty());

    let mut taken = account::Column::AccountName.eq(account_name.clone());
    if let Some(email) = &email {
        taken = taken.or(account::Column::Email.eq(email.clone()));
    }
    if account::Entity::find().filter(taken).one(db).await?.is_some() {
        return Err(ComputeError::Validation(
            "Account name or email is already registered".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let txn = db.begin().await?;

    let account = account::ActiveModel {
        account_name: Set(account_name.clone()),
        email: Set(email),
        display_name: Set(new_account.display_name.clone()),
        currency: Set(currency),
        created_at: Set(today),
        updated_at: Set(today),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    person::ActiveModel {
        account_id: Set(account.id),
        name: Set(new_account.display_name.unwrap_or(account_name)),
        created_at: Set(today),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let personal = scope::ActiveModel {
        name: Set("Personal".to_string()),
        scope_type: Set(ScopeType::Personal),
        created_at: Set(today),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    grant(&txn, personal.id, account.id, AccessType::Owner, InviteStatus::Accepted).await?;

    txn.commit().await?;
    info!(account_id = account.id, scope_id = personal.id, "Account provisioned");
    Ok(account)
}

async fn grant<C: ConnectionTrait>(
    db: &C,
    scope_id: i32,
    account_id: i32,
    access_type: AccessType,
    invite_status: InviteStatus,
) -> Result<scope_access::Model> {
    let today = Utc::now().date_naive();
    Ok(scope_access::ActiveModel {
        scope_id: Set(scope_id),
        account_id: Set(account_id),
        access_type: Set(access_type),
        invite_status: Set(invite_status),
        created_at: Set(today),
        updated_at: Set(today),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Lists every scope the account holds accepted access to, with its role.
pub async fn list_scopes<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<ScopeSummary>> {
    let rows = scope_access::Entity::find()
        .filter(scope_access::Column::AccountId.eq(account_id))
        .filter(scope_access::Column::InviteStatus.eq(InviteStatus::Accepted))
        .order_by_asc(scope_access::Column::ScopeId)
        .find_also_related(scope::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(access, scope)| {
            scope.map(|scope| ScopeSummary {
                scope,
                access_type: access.access_type,
            })
        })
        .collect())
}

/// Creates a household scope owned by `account_id`. Scope and owner row commit together.
#[instrument(skip(db))]
pub async fn create_household(db: &DatabaseConnection, account_id: i32, name: &str) -> Result<scope::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ComputeError::Validation("Household name must not be empty".to_string()));
    }

    let txn = db.begin().await?;
    let household = scope::ActiveModel {
        name: Set(name.to_string()),
        scope_type: Set(ScopeType::Household),
        created_at: Set(Utc::now().date_naive()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    grant(&txn, household.id, account_id, AccessType::Owner, InviteStatus::Accepted).await?;
    txn.commit().await?;

    info!(account_id, scope_id = household.id, "Household created");
    Ok(household)
}

/// Invites the account registered under `email` into a household. Owner only.
#[instrument(skip(db))]
pub async fn invite_member(
    db: &DatabaseConnection,
    inviter_id: i32,
    scope_id: i32,
    email: &str,
) -> Result<scope_access::Model> {
    let inviter = require_scope_access(db, inviter_id, scope_id).await?;
    if inviter.access_type != AccessType::Owner {
        warn!(inviter_id, scope_id, "Non-owner attempted to invite");
        return Err(ComputeError::Forbidden(
            "Only the household owner can invite members".to_string(),
        ));
    }

    let household = scope::Entity::find_by_id(scope_id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("Scope {scope_id} not found")))?;
    if household.scope_type != ScopeType::Household {
        return Err(ComputeError::Validation("Personal scopes cannot be shared".to_string()));
    }

    let email = email.trim().to_lowercase();
    let invitee = account::Entity::find()
        .filter(account::Column::Email.eq(email.clone()))
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("No account registered with email {email}")))?;

    let existing = scope_access::Entity::find()
        .filter(scope_access::Column::ScopeId.eq(scope_id))
        .filter(scope_access::Column::AccountId.eq(invitee.id))
        .one(db)
        .await?;
    if let Some(existing) = existing {
        debug!(status = ?existing.invite_status, "Invitee already has an access row");
        return Err(ComputeError::Validation(
            "Account is already a member or has been invited".to_string(),
        ));
    }

    let invite = grant(db, scope_id, invitee.id, AccessType::Member, InviteStatus::Pending).await?;
    info!(scope_id, invitee_id = invitee.id, "Household invite created");
    Ok(invite)
}

/// Resolves the caller's pending invite to `scope_id`.
#[instrument(skip(db))]
pub async fn respond_to_invite(
    db: &DatabaseConnection,
    account_id: i32,
    scope_id: i32,
    accept: bool,
) -> Result<scope_access::Model> {
    let invite = scope_access::Entity::find()
        .filter(scope_access::Column::ScopeId.eq(scope_id))
        .filter(scope_access::Column::AccountId.eq(account_id))
        .filter(scope_access::Column::InviteStatus.eq(InviteStatus::Pending))
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("No pending invite for scope {scope_id}")))?;

    let status = if accept {
        InviteStatus::Accepted
    } else {
        InviteStatus::Rejected
    };

    let mut active: scope_access::ActiveModel = invite.into();
    active.invite_status = Set(status);
    active.updated_at = Set(Utc::now().date_naive());
    let updated = active.update(db).await?;

    info!(account_id, scope_id, ?status, "Invite resolved");
    Ok(updated)
}

/// Household invites still waiting for the account's answer.
pub async fn pending_invites<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<PendingInvite>> {
    let invites = scope_access::Entity::find()
        .filter(scope_access::Column::AccountId.eq(account_id))
        .filter(scope_access::Column::InviteStatus.eq(InviteStatus::Pending))
        .find_also_related(scope::Entity)
        .all(db)
        .await?;

    let scope_ids: Vec<i32> = invites.iter().map(|(invite, _)| invite.scope_id).collect();
    let owner_emails: HashMap<i32, Option<String>> = scope_access::Entity::find()
        .filter(scope_access::Column::ScopeId.is_in(scope_ids))
        .filter(scope_access::Column::AccessType.eq(AccessType::Owner))
        .find_also_related(account::Entity)
        .all(db)
        .await?
        .into_iter()
        .map(|(access, owner)| (access.scope_id, owner.and_then(|owner| owner.email)))
        .collect();

    Ok(invites
        .into_iter()
        .map(|(invite, scope)| PendingInvite {
            scope_id: invite.scope_id,
            scope_name: scope.map(|scope| scope.name).unwrap_or_default(),
            invited_by: owner_emails.get(&invite.scope_id).cloned().flatten(),
        })
        .collect())
}

/// All access rows of a scope the caller can see, including pending invitees.
pub async fn scope_members<C: ConnectionTrait>(
    db: &C,
    account_id: i32,
    scope_id: i32,
) -> Result<Vec<ScopeMember>> {
    require_scope_access(db, account_id, scope_id).await?;

    let rows = scope_access::Entity::find()
        .filter(scope_access::Column::ScopeId.eq(scope_id))
        .order_by_asc(scope_access::Column::Id)
        .find_also_related(account::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(access, member)| {
            member.map(|member| ScopeMember {
                account_id: member.id,
                account_name: member.account_name,
                email: member.email,
                access_type: access.access_type,
                invite_status: access.invite_status,
            })
        })
        .collect())
}

pub async fn list_persons<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<person::Model>> {
    Ok(person::Entity::find()
        .filter(person::Column::AccountId.eq(account_id))
        .order_by_asc(person::Column::Id)
        .all(db)
        .await?)
}

pub async fn add_person<C: ConnectionTrait>(db: &C, account_id: i32, name: &str) -> Result<person::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ComputeError::Validation("Person name must not be empty".to_string()));
    }
    Ok(person::ActiveModel {
        account_id: Set(account_id),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().date_naive()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_account, setup_db};

    #[tokio::test]
    async fn provisioning_creates_personal_scope() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;

        let scopes = list_scopes(&db, alice.id).await.unwrap();
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].scope.scope_type, ScopeType::Personal);
        assert_eq!(scopes[0].access_type, AccessType::Owner);

        let persons = list_persons(&db, alice.id).await.unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].name, "alice");
    }

    #[tokio::test]
    async fn provisioning_rejects_duplicates_and_bad_currency() {
        let db = setup_db().await;
        new_account(&db, "alice").await;

        let duplicate = provision_account(
            &db,
            NewAccount {
                account_name: "someone".to_string(),
                email: Some("ALICE@example.com".to_string()),
                display_name: None,
                currency: "USD".to_string(),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(ComputeError::Validation(_))));

        let bad_currency = provision_account(
            &db,
            NewAccount {
                account_name: "carol".to_string(),
                email: None,
                display_name: None,
                currency: "XYZ1".to_string(),
            },
        )
        .await;
        assert!(matches!(bad_currency, Err(ComputeError::Validation(_))));
    }

    #[tokio::test]
    async fn household_invite_flow() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;

        let smiths = create_household(&db, alice.id, "Smiths").await.unwrap();
        assert!(accessible_scopes(&db, alice.id).await.unwrap().contains(&smiths.id));

        invite_member(&db, alice.id, smiths.id, "bob@example.com").await.unwrap();

        // Pending does not grant access
        assert!(!accessible_scopes(&db, bob.id).await.unwrap().contains(&smiths.id));
        let invites = pending_invites(&db, bob.id).await.unwrap();
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0].scope_name, "Smiths");
        assert_eq!(invites[0].invited_by.as_deref(), Some("alice@example.com"));

        let accepted = respond_to_invite(&db, bob.id, smiths.id, true).await.unwrap();
        assert_eq!(accepted.invite_status, InviteStatus::Accepted);
        assert!(accessible_scopes(&db, bob.id).await.unwrap().contains(&smiths.id));
        assert!(pending_invites(&db, bob.id).await.unwrap().is_empty());

        // Resolved invites are terminal
        let again = respond_to_invite(&db, bob.id, smiths.id, false).await;
        assert!(matches!(again, Err(ComputeError::NotFound(_))));

        let members = scope_members(&db, bob.id, smiths.id).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].access_type, AccessType::Owner);
        assert_eq!(members[1].account_name, "bob");
    }

    #[tokio::test]
    async fn rejected_invite_never_grants_access() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let smiths = create_household(&db, alice.id, "Smiths").await.unwrap();

        invite_member(&db, alice.id, smiths.id, "bob@example.com").await.unwrap();
        let rejected = respond_to_invite(&db, bob.id, smiths.id, false).await.unwrap();
        assert_eq!(rejected.invite_status, InviteStatus::Rejected);

        assert!(!accessible_scopes(&db, bob.id).await.unwrap().contains(&smiths.id));
        let denied = require_scope_access(&db, bob.id, smiths.id).await;
        assert!(matches!(denied, Err(ComputeError::Forbidden(_))));

        // A rejected row still blocks a second invite
        let reinvite = invite_member(&db, alice.id, smiths.id, "bob@example.com").await;
        assert!(matches!(reinvite, Err(ComputeError::Validation(_))));
    }

    #[tokio::test]
    async fn only_owners_invite() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        new_account(&db, "carol").await;
        let smiths = create_household(&db, alice.id, "Smiths").await.unwrap();

        invite_member(&db, alice.id, smiths.id, "bob@example.com").await.unwrap();
        respond_to_invite(&db, bob.id, smiths.id, true).await.unwrap();

        let by_member = invite_member(&db, bob.id, smiths.id, "carol@example.com").await;
        assert!(matches!(by_member, Err(ComputeError::Forbidden(_))));

        let unknown = invite_member(&db, alice.id, smiths.id, "nobody@example.com").await;
        assert!(matches!(unknown, Err(ComputeError::NotFound(_))));
    }

    #[tokio::test]
    async fn personal_scope_cannot_be_shared() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        new_account(&db, "bob").await;
        let personal = *accessible_scopes(&db, alice.id).await.unwrap().first().unwrap();

        let shared = invite_member(&db, alice.id, personal, "bob@example.com").await;
        assert!(matches!(shared, Err(ComputeError::Validation(_))));
    }

    #[tokio::test]
    async fn resolve_scopes_checks_explicit_scope() {
        let db = setup_db().await;
        let alice = new_account(&db, "alice").await;
        let bob = new_account(&db, "bob").await;
        let bob_personal = *accessible_scopes(&db, bob.id).await.unwrap().first().unwrap();

        let all = resolve_scopes(&db, alice.id, None).await.unwrap();
        assert_eq!(all.len(), 1);

        let foreign = resolve_scopes(&db, alice.id, Some(bob_personal)).await;
        assert!(matches!(foreign, Err(ComputeError::Forbidden(_))));
    }
}
