use sea_orm::{ActiveValue, ConnectionTrait, TransactionTrait, prelude::*};

use crate::{
    EngineError, Member, MemberId, ResultEngine, users,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

/// Fails with `KeyNotFound` unless `member_id` is a known user.
pub(super) async fn require_user<C: ConnectionTrait>(
    db: &C,
    member_id: &MemberId,
) -> ResultEngine<users::Model> {
    users::Entity::find_by_id(member_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("user {member_id}")))
}

impl Engine {
    /// Adds a user to the directory.
    pub async fn create_user(
        &self,
        username: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> ResultEngine<Member> {
        let username = normalize_required_name(username, "username")?;
        let display_name = normalize_required_name(display_name, "display name")?;
        let avatar_url = normalize_optional_text(avatar_url);

        with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(username.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(username));
            }

            let model = users::ActiveModel {
                username: ActiveValue::Set(username),
                display_name: ActiveValue::Set(display_name),
                avatar_url: ActiveValue::Set(avatar_url),
            }
            .insert(&db_tx)
            .await?;

            Ok(Member::from(model))
        })
    }

    /// Directory lookup, used to present settlement instructions.
    pub async fn user(&self, member_id: &MemberId) -> ResultEngine<Member> {
        require_user(&self.database, member_id)
            .await
            .map(Member::from)
    }
}
