use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, Group, MemberId, Money, ResultEngine, group_members, groups,
    util::normalize_required_name,
};

use super::{Engine, users::require_user, with_tx};

pub(super) async fn require_group<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
) -> ResultEngine<groups::Model> {
    groups::Entity::find_by_id(group_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("group {group_id}")))
}

/// Current members of a group in join order.
pub(super) async fn members_of<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
) -> ResultEngine<Vec<MemberId>> {
    let rows = group_members::Entity::find()
        .filter(group_members::Column::GroupId.eq(group_id.to_string()))
        .order_by_asc(group_members::Column::JoinedAt)
        .order_by_asc(group_members::Column::UserId)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|m| MemberId::from(m.user_id)).collect())
}

/// Fails with `InvalidMember` unless every id in `candidates` is in `members`.
pub(super) fn ensure_members<'a>(
    members: &[MemberId],
    candidates: impl IntoIterator<Item = &'a MemberId>,
) -> ResultEngine<()> {
    for candidate in candidates {
        if !members.contains(candidate) {
            return Err(EngineError::InvalidMember(format!(
                "{candidate} is not a member of the group"
            )));
        }
    }
    Ok(())
}

/// Adds `delta` to the denormalized expense total of a group.
pub(super) async fn adjust_group_total<C: ConnectionTrait>(
    db: &C,
    group: groups::Model,
    delta: Money,
) -> ResultEngine<()> {
    if delta.is_zero() {
        return Ok(());
    }
    let total = Money::new(group.total_expenses_minor) + delta;
    let mut active: groups::ActiveModel = group.into();
    active.total_expenses_minor = ActiveValue::Set(total.cents());
    active.update(db).await?;
    Ok(())
}

impl Engine {
    /// Creates a group; `created_by` becomes its first member.
    pub async fn new_group(&self, name: &str, created_by: &MemberId) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "group name")?;
        let group_id = Uuid::new_v4();
        let now = Utc::now();

        with_tx!(self, |db_tx| {
            require_user(&db_tx, created_by).await?;

            groups::ActiveModel {
                id: ActiveValue::Set(group_id.to_string()),
                name: ActiveValue::Set(name),
                created_by: ActiveValue::Set(created_by.to_string()),
                total_expenses_minor: ActiveValue::Set(0),
                created_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            group_members::ActiveModel {
                group_id: ActiveValue::Set(group_id.to_string()),
                user_id: ActiveValue::Set(created_by.to_string()),
                joined_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            tracing::debug!(%group_id, %created_by, "group created");
            Ok(group_id)
        })
    }

    /// Group with its current members and expense total.
    pub async fn group(&self, group_id: Uuid) -> ResultEngine<Group> {
        let model = require_group(&self.database, group_id).await?;
        let members = members_of(&self.database, group_id).await?;
        Group::try_from((model, members))
    }

    /// Current members of a group in join order.
    pub async fn group_members(&self, group_id: Uuid) -> ResultEngine<Vec<MemberId>> {
        require_group(&self.database, group_id).await?;
        members_of(&self.database, group_id).await
    }

    /// Adds a known user to a group.
    pub async fn add_group_member(&self, group_id: Uuid, member_id: &MemberId) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_group(&db_tx, group_id).await?;
            require_user(&db_tx, member_id).await?;

            if members_of(&db_tx, group_id).await?.contains(member_id) {
                return Err(EngineError::ExistingKey(format!(
                    "{member_id} in group {group_id}"
                )));
            }

            group_members::ActiveModel {
                group_id: ActiveValue::Set(group_id.to_string()),
                user_id: ActiveValue::Set(member_id.to_string()),
                joined_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            tracing::debug!(%group_id, %member_id, "member added");
            Ok(())
        })
    }
}
