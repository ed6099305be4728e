//! Membership reconciliation.
//!
//! When a member leaves a group, every active expense they took part in is
//! rewritten so that their share is redistributed over the remaining
//! participants according to the expense's split strategy. The expense amount
//! never changes.
//!
//! | strategy     | redistribution                                                  |
//! |--------------|-----------------------------------------------------------------|
//! | `equal`      | amount split evenly again                                       |
//! | `percentage` | remaining percentages rescaled to 100 %, amounts re-allocated   |
//! | `shares`     | amounts re-allocated over the remaining shares                  |
//! | `exact`      | unchanged when they fit, scaled down when they exceed the total |
//!
//! For `exact` splits the removed share is absorbed: the owed total can end
//! below the expense amount.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Expense, MemberId, Money, Participant, Percent, ResultEngine, SplitStrategy,
    split::{distribute, rescale_percentages},
};

/// An expense whose participants were rewritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledExpense {
    pub expense: Expense,
    /// Audit reason, e.g. `member removed: bob`.
    pub note: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Expenses that changed, with their new participants.
    pub changed: Vec<ReconciledExpense>,
    /// Expenses left untouched because no participant would remain.
    pub skipped: Vec<Uuid>,
    /// Active expenses paid by the removed member. Their credit no longer
    /// counts towards any balance.
    pub orphaned_payers: Vec<Uuid>,
}

/// Redistributes `removed`'s shares over the other participants.
///
/// Only active expenses listing `removed` as participant are rewritten; the
/// rest are omitted from the result. `remaining` is the membership after the
/// removal and must not contain `removed`.
pub fn reconcile_after_removal(
    expenses: &[Expense],
    removed: &MemberId,
    remaining: &[MemberId],
) -> ResultEngine<Reconciliation> {
    if remaining.contains(removed) {
        return Err(EngineError::InvalidMember(format!(
            "{removed} is still listed as a remaining member"
        )));
    }

    let note = format!("member removed: {removed}");
    let mut reconciliation = Reconciliation::default();

    for expense in expenses.iter().filter(|e| e.is_active) {
        if &expense.paid_by == removed {
            reconciliation.orphaned_payers.push(expense.id);
        }
        if !expense.has_participant(removed) {
            continue;
        }

        let remaining_participants: Vec<Participant> = expense
            .participants
            .iter()
            .filter(|p| &p.member_id != removed)
            .cloned()
            .collect();
        if remaining_participants.is_empty() {
            reconciliation.skipped.push(expense.id);
            continue;
        }

        let participants = redistribute(expense.split, expense.amount, remaining_participants);
        let mut rewritten = expense.clone();
        rewritten.participants = participants;
        rewritten.reconciliation_note = Some(note.clone());
        reconciliation.changed.push(ReconciledExpense {
            expense: rewritten,
            note: note.clone(),
        });
    }

    Ok(reconciliation)
}

fn redistribute(
    strategy: SplitStrategy,
    amount: Money,
    mut participants: Vec<Participant>,
) -> Vec<Participant> {
    match strategy {
        SplitStrategy::Equal => {
            let amounts = distribute(amount, &vec![1; participants.len()]);
            for (participant, amount) in participants.iter_mut().zip(amounts) {
                participant.amount = amount;
            }
        }
        SplitStrategy::Percentage => {
            let weights: Vec<u64> = participants
                .iter()
                .map(|p| u64::from(p.percentage.unwrap_or(Percent::ZERO).basis_points()))
                .collect();
            // A zero total falls back to an equal split with 100/n each.
            let percentages = rescale_percentages(&weights);
            let bps: Vec<u64> = percentages
                .iter()
                .map(|p| u64::from(p.basis_points()))
                .collect();
            let amounts = distribute(amount, &bps);
            for ((participant, percentage), amount) in
                participants.iter_mut().zip(percentages).zip(amounts)
            {
                participant.percentage = Some(percentage);
                participant.amount = amount;
            }
        }
        SplitStrategy::Shares => {
            let weights: Vec<u64> = participants
                .iter()
                .map(|p| u64::from(p.shares.filter(|s| *s > 0).unwrap_or(1)))
                .collect();
            let amounts = distribute(amount, &weights);
            for (participant, amount) in participants.iter_mut().zip(amounts) {
                participant.amount = amount;
            }
        }
        SplitStrategy::Exact => {
            let total: Money = participants.iter().map(|p| p.amount).sum();
            if total > amount {
                let weights: Vec<u64> = participants
                    .iter()
                    .map(|p| p.amount.cents().max(0) as u64)
                    .collect();
                let amounts = distribute(amount, &weights);
                for (participant, amount) in participants.iter_mut().zip(amounts) {
                    participant.amount = amount;
                }
            }
        }
    }
    participants
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::Split;

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|n| MemberId::from(*n)).collect()
    }

    fn expense(amount: i64, split: Split) -> Expense {
        Expense::new(
            Uuid::new_v4(),
            "expense",
            Money::new(amount),
            MemberId::from("a"),
            &split,
            Utc::now(),
        )
        .unwrap()
    }

    fn amounts(expense: &Expense) -> Vec<(String, i64)> {
        expense
            .participants
            .iter()
            .map(|p| (p.member_id.to_string(), p.amount.cents()))
            .collect()
    }

    fn reconcile_one(expense: &Expense, removed: &str, remaining: &[&str]) -> Expense {
        let result =
            reconcile_after_removal(&[expense.clone()], &removed.into(), &ids(remaining)).unwrap();
        assert_eq!(result.changed.len(), 1);
        result.changed[0].expense.clone()
    }

    #[test]
    fn equal_split_is_recomputed() {
        let expense = expense(90_00, Split::Equal(ids(&["a", "b", "c"])));
        let rewritten = reconcile_one(&expense, "b", &["a", "c"]);
        assert_eq!(
            amounts(&rewritten),
            vec![("a".to_string(), 45_00), ("c".to_string(), 45_00)]
        );
        assert_eq!(
            rewritten.reconciliation_note.as_deref(),
            Some("member removed: b")
        );
        assert_eq!(rewritten.amount, expense.amount);
    }

    #[test]
    fn percentages_are_rescaled() {
        let split = Split::Percentage(vec![
            ("a".into(), "50".parse().unwrap()),
            ("b".into(), "30".parse().unwrap()),
            ("c".into(), "20".parse().unwrap()),
        ]);
        let rewritten = reconcile_one(&expense(100_00, split), "a", &["b", "c"]);
        assert_eq!(
            amounts(&rewritten),
            vec![("b".to_string(), 60_00), ("c".to_string(), 40_00)]
        );
        let percentages: Vec<u32> = rewritten
            .participants
            .iter()
            .filter_map(|p| p.percentage.map(Percent::basis_points))
            .collect();
        assert_eq!(percentages, vec![6000, 4000]);
    }

    #[test]
    fn zero_remaining_percentage_falls_back_to_equal() {
        let split = Split::Percentage(vec![
            ("a".into(), "100".parse().unwrap()),
            ("b".into(), Percent::ZERO),
            ("c".into(), Percent::ZERO),
        ]);
        let rewritten = reconcile_one(&expense(10_01, split), "a", &["b", "c"]);
        assert_eq!(
            amounts(&rewritten),
            vec![("b".to_string(), 5_01), ("c".to_string(), 5_00)]
        );
        assert!(
            rewritten
                .participants
                .iter()
                .all(|p| p.percentage.map(Percent::basis_points) == Some(5000))
        );
    }

    #[test]
    fn shares_keep_their_weights() {
        let split = Split::Shares(vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 1)]);
        let rewritten = reconcile_one(&expense(40_00, split), "c", &["a", "b"]);
        assert_eq!(
            amounts(&rewritten),
            vec![("a".to_string(), 13_33), ("b".to_string(), 26_67)]
        );
        assert_eq!(rewritten.participants[1].shares, Some(2));
    }

    #[test]
    fn exact_split_absorbs_removed_share() {
        let split = Split::Exact(vec![
            ("a".into(), Money::new(10_00)),
            ("b".into(), Money::new(15_00)),
            ("c".into(), Money::new(5_00)),
        ]);
        let rewritten = reconcile_one(&expense(30_00, split), "b", &["a", "c"]);
        assert_eq!(
            amounts(&rewritten),
            vec![("a".to_string(), 10_00), ("c".to_string(), 5_00)]
        );
        assert_eq!(rewritten.owed_total(), Money::new(15_00));
    }

    #[test]
    fn exact_split_exceeding_total_is_scaled_down() {
        let mut expense = expense(
            20_00,
            Split::Exact(vec![
                ("a".into(), Money::new(10_00)),
                ("b".into(), Money::new(10_00)),
            ]),
        );
        // Inconsistent data: remaining shares already exceed the amount.
        expense.participants[0].amount = Money::new(30_00);
        expense.participants.push(Participant::new("c".into(), Money::new(10_00)));

        let rewritten = reconcile_one(&expense, "b", &["a", "c"]);
        assert_eq!(
            amounts(&rewritten),
            vec![("a".to_string(), 15_00), ("c".to_string(), 5_00)]
        );
    }

    #[test]
    fn untouched_skipped_and_orphaned_expenses() {
        let without_b = expense(10_00, Split::Equal(ids(&["a", "c"])));
        let only_b = expense(10_00, Split::Equal(ids(&["b"])));
        let mut paid_by_b = expense(10_00, Split::Equal(ids(&["a", "b"])));
        paid_by_b.paid_by = "b".into();
        let mut inactive = expense(10_00, Split::Equal(ids(&["a", "b"])));
        inactive.is_active = false;

        let result = reconcile_after_removal(
            &[without_b, only_b.clone(), paid_by_b.clone(), inactive],
            &"b".into(),
            &ids(&["a", "c"]),
        )
        .unwrap();

        assert_eq!(result.skipped, vec![only_b.id]);
        assert_eq!(result.orphaned_payers, vec![paid_by_b.id]);
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].expense.id, paid_by_b.id);
        assert_eq!(amounts(&result.changed[0].expense), vec![("a".to_string(), 10_00)]);
    }

    #[test]
    fn removed_member_cannot_remain() {
        let err = reconcile_after_removal(&[], &"b".into(), &ids(&["a", "b"])).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidMember("b is still listed as a remaining member".to_string())
        );
    }
}
