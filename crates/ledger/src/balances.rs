//! Balance calculation.
//!
//! [`compute_balances`] derives every current member's position from the raw
//! expenses of a group. Contributions from ids that are no longer members are
//! dropped (and reported), never turned into an error: this is the expected
//! state between a membership removal and the expense rewrite, or after a
//! data inconsistency.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Expense, MemberId, Money};

/// A member's position within a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of the expenses the member paid.
    pub paid: Money,
    /// Sum of the member's participant shares.
    pub owed: Money,
    /// `paid - owed`: positive when the group owes the member.
    pub net: Money,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Paid,
    Owed,
}

/// An expense contribution that referenced a non-member and was ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedContribution {
    pub expense_id: Uuid,
    pub member_id: MemberId,
    pub kind: ContributionKind,
    pub amount: Money,
}

/// Balances of a group, in membership order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    entries: Vec<(MemberId, Balance)>,
    dropped: Vec<DroppedContribution>,
}

impl Balances {
    /// Builds balances from explicit `(member, net)` pairs.
    ///
    /// `paid`/`owed` are left at zero except for the sign of `net`; mostly
    /// useful to feed the settlement planner directly.
    pub fn from_nets(nets: impl IntoIterator<Item = (MemberId, Money)>) -> Self {
        let mut balances = Self::default();
        for (member_id, net) in nets {
            if balances.position(&member_id).is_some() {
                continue;
            }
            let balance = if net.is_negative() {
                Balance {
                    paid: Money::ZERO,
                    owed: -net,
                    net,
                }
            } else {
                Balance {
                    paid: net,
                    owed: Money::ZERO,
                    net,
                }
            };
            balances.entries.push((member_id, balance));
        }
        balances
    }

    pub fn get(&self, member_id: &MemberId) -> Option<&Balance> {
        self.position(member_id).map(|idx| &self.entries[idx].1)
    }

    /// Net balance of `member_id`, zero when unknown.
    pub fn net(&self, member_id: &MemberId) -> Money {
        self.get(member_id).map(|b| b.net).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemberId, &Balance)> {
        self.entries.iter().map(|(id, balance)| (id, balance))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every net balance. Zero whenever the expenses only reference
    /// current members.
    pub fn total_net(&self) -> Money {
        self.entries.iter().map(|(_, b)| b.net).sum()
    }

    /// Contributions ignored because they referenced non-members.
    pub fn dropped(&self) -> &[DroppedContribution] {
        &self.dropped
    }

    fn position(&self, member_id: &MemberId) -> Option<usize> {
        self.entries.iter().position(|(id, _)| id == member_id)
    }
}

/// Computes the balance of every member in `members` from `expenses`.
///
/// Inactive expenses are skipped. Expenses are walked in stored order, then
/// participants in stored order. Duplicate ids in `members` collapse to the
/// first occurrence.
pub fn compute_balances(expenses: &[Expense], members: &[MemberId]) -> Balances {
    let mut entries: Vec<(MemberId, Balance)> = Vec::with_capacity(members.len());
    let mut index: HashMap<&MemberId, usize> = HashMap::with_capacity(members.len());
    for member_id in members {
        if index.contains_key(member_id) {
            continue;
        }
        index.insert(member_id, entries.len());
        entries.push((member_id.clone(), Balance::default()));
    }

    let mut dropped = Vec::new();
    for expense in expenses.iter().filter(|e| e.is_active) {
        match index.get(&expense.paid_by) {
            Some(&idx) => entries[idx].1.paid += expense.amount,
            None => dropped.push(DroppedContribution {
                expense_id: expense.id,
                member_id: expense.paid_by.clone(),
                kind: ContributionKind::Paid,
                amount: expense.amount,
            }),
        }

        for participant in &expense.participants {
            match index.get(&participant.member_id) {
                Some(&idx) => entries[idx].1.owed += participant.amount,
                None => dropped.push(DroppedContribution {
                    expense_id: expense.id,
                    member_id: participant.member_id.clone(),
                    kind: ContributionKind::Owed,
                    amount: participant.amount,
                }),
            }
        }
    }

    for (_, balance) in &mut entries {
        balance.net = balance.paid - balance.owed;
    }

    Balances { entries, dropped }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::Split;

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|n| MemberId::from(*n)).collect()
    }

    fn equal_expense(paid_by: &str, amount: i64, participants: &[&str]) -> Expense {
        Expense::new(
            Uuid::new_v4(),
            "expense",
            Money::new(amount),
            MemberId::from(paid_by),
            &Split::Equal(ids(participants)),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn equal_dinner_between_three() {
        let expenses = vec![equal_expense("a", 90_00, &["a", "b", "c"])];
        let balances = compute_balances(&expenses, &ids(&["a", "b", "c"]));

        assert_eq!(
            balances.get(&"a".into()),
            Some(&Balance {
                paid: Money::new(90_00),
                owed: Money::new(30_00),
                net: Money::new(60_00),
            })
        );
        assert_eq!(balances.net(&"b".into()), Money::new(-30_00));
        assert_eq!(balances.net(&"c".into()), Money::new(-30_00));
        assert_eq!(balances.total_net(), Money::ZERO);
        assert!(balances.dropped().is_empty());
    }

    #[test]
    fn inactive_expenses_are_ignored() {
        let mut expense = equal_expense("a", 50_00, &["a", "b"]);
        expense.is_active = false;
        let balances = compute_balances(&[expense], &ids(&["a", "b"]));
        assert_eq!(balances.net(&"a".into()), Money::ZERO);
        assert_eq!(balances.net(&"b".into()), Money::ZERO);
    }

    #[test]
    fn unknown_members_are_dropped_and_reported() {
        let expense = equal_expense("gone", 30_00, &["a", "gone", "b"]);
        let balances = compute_balances(&[expense.clone()], &ids(&["a", "b"]));

        assert_eq!(balances.len(), 2);
        assert_eq!(balances.net(&"a".into()), Money::new(-10_00));
        assert_eq!(balances.net(&"b".into()), Money::new(-10_00));
        assert_eq!(
            balances.dropped(),
            &[
                DroppedContribution {
                    expense_id: expense.id,
                    member_id: "gone".into(),
                    kind: ContributionKind::Paid,
                    amount: Money::new(30_00),
                },
                DroppedContribution {
                    expense_id: expense.id,
                    member_id: "gone".into(),
                    kind: ContributionKind::Owed,
                    amount: Money::new(10_00),
                },
            ]
        );
    }

    #[test]
    fn members_without_expenses_have_zero_balance() {
        let balances = compute_balances(&[], &ids(&["a", "b", "a"]));
        let members: Vec<&MemberId> = balances.iter().map(|(id, _)| id).collect();
        assert_eq!(members, vec![&MemberId::from("a"), &MemberId::from("b")]);
        assert!(balances.iter().all(|(_, b)| *b == Balance::default()));
    }
}
