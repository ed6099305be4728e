//! Participant rows of an expense, stored in split order.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, MemberId, Money, Participant, Percent};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub position: i32,
    pub member_id: String,
    pub amount_minor: i64,
    pub percentage_bps: Option<i32>,
    pub shares: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Builds the rows for `participants`, numbering them in order.
pub(crate) fn active_models(expense_id: Uuid, participants: &[Participant]) -> Vec<ActiveModel> {
    participants
        .iter()
        .enumerate()
        .map(|(position, participant)| ActiveModel {
            expense_id: ActiveValue::Set(expense_id.to_string()),
            position: ActiveValue::Set(position as i32),
            member_id: ActiveValue::Set(participant.member_id.to_string()),
            amount_minor: ActiveValue::Set(participant.amount.cents()),
            percentage_bps: ActiveValue::Set(
                participant.percentage.map(|p| p.basis_points() as i32),
            ),
            shares: ActiveValue::Set(participant.shares.map(|s| s as i32)),
        })
        .collect()
}

impl TryFrom<Model> for Participant {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let percentage = model
            .percentage_bps
            .map(|bps| {
                u32::try_from(bps)
                    .map_err(|_| EngineError::InvalidSplit(format!("invalid percentage: {bps}")))
                    .and_then(Percent::from_basis_points)
            })
            .transpose()?;
        let shares = model
            .shares
            .map(|shares| {
                u32::try_from(shares)
                    .map_err(|_| EngineError::InvalidSplit(format!("invalid shares: {shares}")))
            })
            .transpose()?;

        Ok(Self {
            member_id: MemberId::from(model.member_id),
            amount: Money::new(model.amount_minor),
            percentage,
            shares,
        })
    }
}
