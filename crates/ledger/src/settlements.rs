//! Settlement records.
//!
//! A [`SettlementRecord`] is a real-world transfer between two members. Only
//! `completed` records count as proof of payment; `pending` ones are claims
//! waiting for confirmation and never reduce what is outstanding.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MemberId, Money, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Completed,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for SettlementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(EngineError::InvalidId(format!(
                "invalid settlement status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub group_id: Uuid,
    pub from_user_id: MemberId,
    pub to_user_id: MemberId,
    pub amount: Money,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementRecord {
    pub fn new(
        group_id: Uuid,
        from_user_id: MemberId,
        to_user_id: MemberId,
        amount: Money,
        status: SettlementStatus,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount("invalid amount".to_string()));
        }
        if from_user_id == to_user_id {
            return Err(EngineError::InvalidMember(format!(
                "{from_user_id} cannot settle with themselves"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            from_user_id,
            to_user_id,
            amount,
            status,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == SettlementStatus::Completed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount_minor: i64,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&SettlementRecord> for ActiveModel {
    fn from(record: &SettlementRecord) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            group_id: ActiveValue::Set(record.group_id.to_string()),
            from_user_id: ActiveValue::Set(record.from_user_id.to_string()),
            to_user_id: ActiveValue::Set(record.to_user_id.to_string()),
            amount_minor: ActiveValue::Set(record.amount.cents()),
            status: ActiveValue::Set(record.status.as_str().to_string()),
            created_at: ActiveValue::Set(record.created_at),
            updated_at: ActiveValue::Set(record.updated_at),
        }
    }
}

impl TryFrom<Model> for SettlementRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            from_user_id: MemberId::from(model.from_user_id),
            to_user_id: MemberId::from(model.to_user_id),
            amount: Money::new(model.amount_minor),
            status: SettlementStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_self_settlements() {
        let group = Uuid::new_v4();
        let now = Utc::now();
        assert_eq!(
            SettlementRecord::new(
                group,
                "bob".into(),
                "alice".into(),
                Money::ZERO,
                SettlementStatus::Completed,
                now,
            ),
            Err(EngineError::InvalidAmount("invalid amount".to_string()))
        );
        assert_eq!(
            SettlementRecord::new(
                group,
                "bob".into(),
                "bob".into(),
                Money::new(1_00),
                SettlementStatus::Pending,
                now,
            ),
            Err(EngineError::InvalidMember(
                "bob cannot settle with themselves".to_string()
            ))
        );
    }
}
