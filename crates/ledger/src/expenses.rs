//! Expense primitives.
//!
//! An [`Expense`] is a payment fronted by one member (`paid_by`) and owed by
//! its [`Participant`]s. Participant amounts always add up to the expense
//! amount, except after an `exact` split lost a participant to a membership
//! removal (the removed share is absorbed, see [`crate::reconcile`]).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MemberId, Money, Percent, ResultEngine, Split, util::normalize_required_name,
    util::parse_uuid,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    Equal,
    Percentage,
    Shares,
    Exact,
}

impl SplitStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Percentage => "percentage",
            Self::Shares => "shares",
            Self::Exact => "exact",
        }
    }
}

impl TryFrom<&str> for SplitStrategy {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "equal" => Ok(Self::Equal),
            "percentage" => Ok(Self::Percentage),
            "shares" => Ok(Self::Shares),
            "exact" => Ok(Self::Exact),
            other => Err(EngineError::InvalidSplit(format!(
                "invalid split strategy: {other}"
            ))),
        }
    }
}

/// One member's share of an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub member_id: MemberId,
    pub amount: Money,
    pub percentage: Option<Percent>,
    pub shares: Option<u32>,
}

impl Participant {
    pub fn new(member_id: MemberId, amount: Money) -> Self {
        Self {
            member_id,
            amount,
            percentage: None,
            shares: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub amount: Money,
    pub paid_by: MemberId,
    pub split: SplitStrategy,
    pub participants: Vec<Participant>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reconciliation_note: Option<String>,
}

impl Expense {
    /// Builds a new active expense, allocating `split` over `amount`.
    pub fn new(
        group_id: Uuid,
        description: &str,
        amount: Money,
        paid_by: MemberId,
        split: &Split,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let description = normalize_required_name(description, "expense description")?;
        let participants = split.allocate(amount)?;
        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            description,
            amount,
            paid_by,
            split: split.strategy(),
            participants,
            is_active: true,
            created_at,
            updated_at: created_at,
            reconciliation_note: None,
        })
    }

    /// Sum of every participant share.
    pub fn owed_total(&self) -> Money {
        self.participants.iter().map(|p| p.amount).sum()
    }

    pub fn has_participant(&self, member_id: &MemberId) -> bool {
        self.participants.iter().any(|p| &p.member_id == member_id)
    }
}

/// User input for a new expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: Money,
    pub paid_by: MemberId,
    pub split: Split,
}

/// User edit of an existing expense. `None` keeps the current value.
///
/// Changing the amount of an expense without a new split re-applies the
/// current strategy when it can be derived from the stored participants
/// (`equal`, `percentage`, `shares`); `exact` edits must provide a split.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseEdit {
    pub description: Option<String>,
    pub amount: Option<Money>,
    pub paid_by: Option<MemberId>,
    pub split: Option<Split>,
}

impl Expense {
    /// Reconstructs the split input that produced the current participants.
    pub fn current_split(&self) -> Option<Split> {
        let members = || self.participants.iter().map(|p| p.member_id.clone());
        match self.split {
            SplitStrategy::Equal => Some(Split::Equal(members().collect())),
            SplitStrategy::Percentage => self
                .participants
                .iter()
                .map(|p| p.percentage.map(|pct| (p.member_id.clone(), pct)))
                .collect::<Option<Vec<_>>>()
                .map(Split::Percentage),
            SplitStrategy::Shares => Some(Split::Shares(
                self.participants
                    .iter()
                    .map(|p| (p.member_id.clone(), p.shares.filter(|s| *s > 0).unwrap_or(1)))
                    .collect(),
            )),
            SplitStrategy::Exact => None,
        }
    }

    /// Applies a user edit, re-allocating participants when needed.
    pub fn apply_edit(&mut self, edit: ExpenseEdit, at: DateTime<Utc>) -> ResultEngine<()> {
        let amount = edit.amount.unwrap_or(self.amount);
        let split = match edit.split {
            Some(split) => Some(split),
            None if amount != self.amount => Some(self.current_split().ok_or_else(|| {
                EngineError::InvalidSplit(
                    "changing the amount of an exact split requires new amounts".to_string(),
                )
            })?),
            None => None,
        };

        let description = edit
            .description
            .map(|d| normalize_required_name(&d, "expense description"))
            .transpose()?;
        let allocation = split
            .map(|split| split.allocate(amount).map(|rows| (split.strategy(), rows)))
            .transpose()?;

        if let Some(description) = description {
            self.description = description;
        }
        if let Some((strategy, participants)) = allocation {
            self.split = strategy;
            self.participants = participants;
            self.amount = amount;
        }
        if let Some(paid_by) = edit.paid_by {
            self.paid_by = paid_by;
        }
        self.updated_at = at;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub description: String,
    pub amount_minor: i64,
    pub paid_by: String,
    pub split_strategy: String,
    pub is_active: bool,
    pub reconciliation_note: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.to_string()),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            paid_by: ActiveValue::Set(expense.paid_by.to_string()),
            split_strategy: ActiveValue::Set(expense.split.as_str().to_string()),
            is_active: ActiveValue::Set(expense.is_active),
            reconciliation_note: ActiveValue::Set(expense.reconciliation_note.clone()),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
        }
    }
}

impl TryFrom<(Model, Vec<super::participants::Model>)> for Expense {
    type Error = EngineError;

    fn try_from(
        (model, mut rows): (Model, Vec<super::participants::Model>),
    ) -> Result<Self, Self::Error> {
        rows.sort_by_key(|row| row.position);
        let participants = rows
            .into_iter()
            .map(Participant::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            description: model.description,
            amount: Money::new(model.amount_minor),
            paid_by: MemberId::from(model.paid_by),
            split: SplitStrategy::try_from(model.split_strategy.as_str())?,
            participants,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
            reconciliation_note: model.reconciliation_note,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(split: &Split, amount: i64) -> Expense {
        Expense::new(
            Uuid::new_v4(),
            "Dinner",
            Money::new(amount),
            MemberId::from("alice"),
            split,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_expense_rejects_blank_description() {
        let split = Split::Equal(vec![MemberId::from("alice")]);
        let err = Expense::new(
            Uuid::new_v4(),
            "  ",
            Money::new(10_00),
            MemberId::from("alice"),
            &split,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidName("expense description must not be empty".to_string())
        );
    }

    #[test]
    fn editing_amount_reapplies_shares() {
        let split = Split::Shares(vec![(MemberId::from("alice"), 1), (MemberId::from("bob"), 3)]);
        let mut expense = expense(&split, 40_00);
        expense
            .apply_edit(
                ExpenseEdit {
                    amount: Some(Money::new(80_00)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        let amounts: Vec<Money> = expense.participants.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![Money::new(20_00), Money::new(60_00)]);
        assert_eq!(expense.participants[1].shares, Some(3));
    }

    #[test]
    fn editing_exact_amount_requires_split() {
        let split = Split::Exact(vec![
            (MemberId::from("alice"), Money::new(5_00)),
            (MemberId::from("bob"), Money::new(5_00)),
        ]);
        let mut expense = expense(&split, 10_00);
        let err = expense
            .apply_edit(
                ExpenseEdit {
                    amount: Some(Money::new(12_00)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSplit(_)));
        assert_eq!(expense.amount, Money::new(10_00));
    }
}
