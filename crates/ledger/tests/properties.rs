use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use ledger::{
    Expense, MemberId, Money, Percent, SettlementRecord, SettlementStatus, Split, SplitStrategy,
    compute_balances, outstanding_between, plan_settlements, reconcile_after_removal,
};

fn members(count: usize) -> Vec<MemberId> {
    (0..count).map(|idx| MemberId::from(format!("m{idx}"))).collect()
}

/// Non-empty subset of `members` selected by the bits of `mask`.
fn subset(members: &[MemberId], mask: usize) -> Vec<MemberId> {
    let full = (1usize << members.len()) - 1;
    let mask = mask % full + 1;
    members
        .iter()
        .enumerate()
        .filter(|(idx, _)| mask & (1 << idx) != 0)
        .map(|(_, m)| m.clone())
        .collect()
}

fn build_split(kind: usize, participants: Vec<MemberId>, amount: i64, seed: u32) -> Split {
    let count = participants.len();
    match kind % 4 {
        0 => Split::Equal(participants),
        1 => {
            let each = 10_000 / count as u32;
            let first = 10_000 - each * (count as u32 - 1);
            Split::Percentage(
                participants
                    .into_iter()
                    .enumerate()
                    .map(|(idx, m)| {
                        let bps = if idx == 0 { first } else { each };
                        (m, Percent::from_basis_points(bps).unwrap())
                    })
                    .collect(),
            )
        }
        2 => Split::Shares(
            participants
                .into_iter()
                .enumerate()
                .map(|(idx, m)| (m, (seed.wrapping_add(idx as u32 * 7)) % 5 + 1))
                .collect(),
        ),
        _ => {
            let each = amount / count as i64;
            let first = amount - each * (count as i64 - 1);
            Split::Exact(
                participants
                    .into_iter()
                    .enumerate()
                    .map(|(idx, m)| (m, Money::new(if idx == 0 { first } else { each })))
                    .collect(),
            )
        }
    }
}

fn build_expenses(
    members: &[MemberId],
    amounts: &[i64],
    payers: &[usize],
    masks: &[usize],
    kinds: &[usize],
) -> Vec<Expense> {
    let group_id = Uuid::new_v4();
    amounts
        .iter()
        .enumerate()
        .map(|(idx, &amount)| {
            let payer = members[payers.get(idx).copied().unwrap_or(0) % members.len()].clone();
            let participants = subset(members, masks.get(idx).copied().unwrap_or(0));
            let split = build_split(
                kinds.get(idx).copied().unwrap_or(0),
                participants,
                amount,
                idx as u32,
            );
            Expense::new(group_id, "expense", Money::new(amount), payer, &split, Utc::now())
                .unwrap()
        })
        .collect()
}

fn completed(group_id: Uuid, from: &MemberId, to: &MemberId, amount: Money) -> SettlementRecord {
    SettlementRecord::new(
        group_id,
        from.clone(),
        to.clone(),
        amount,
        SettlementStatus::Completed,
        Utc::now(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn balances_sum_to_zero(
        member_count in 1usize..=6,
        amounts in prop::collection::vec(1i64..=100_000, 0..=20),
        payers in prop::collection::vec(0usize..=5, 0..=20),
        masks in prop::collection::vec(0usize..=63, 0..=20),
        kinds in prop::collection::vec(0usize..=3, 0..=20),
    ) {
        let members = members(member_count);
        let expenses = build_expenses(&members, &amounts, &payers, &masks, &kinds);

        for expense in &expenses {
            prop_assert_eq!(expense.owed_total(), expense.amount);
        }

        let balances = compute_balances(&expenses, &members);
        prop_assert_eq!(balances.total_net(), Money::ZERO);
        prop_assert!(balances.dropped().is_empty());
        prop_assert_eq!(balances.len(), member_count);
    }
}

proptest! {
    #[test]
    fn paying_the_plan_settles_everyone(
        member_count in 2usize..=6,
        amounts in prop::collection::vec(1i64..=100_000, 1..=20),
        payers in prop::collection::vec(0usize..=5, 1..=20),
        masks in prop::collection::vec(0usize..=63, 1..=20),
        kinds in prop::collection::vec(0usize..=3, 1..=20),
        prior in prop::collection::vec((0usize..=5, 0usize..=5, 1i64..=5_000), 0..=5),
    ) {
        let members = members(member_count);
        let expenses = build_expenses(&members, &amounts, &payers, &masks, &kinds);
        let balances = compute_balances(&expenses, &members);
        let group_id = Uuid::new_v4();

        // Arbitrary payments made before planning, even ones nobody asked for.
        let mut records: Vec<SettlementRecord> = prior
            .iter()
            .filter(|(from, to, _)| from % member_count != to % member_count)
            .map(|&(from, to, cents)| {
                completed(
                    group_id,
                    &members[from % member_count],
                    &members[to % member_count],
                    Money::new(cents),
                )
            })
            .collect();

        let unpaid = plan_settlements(&balances, &[]);
        let plan = plan_settlements(&balances, &records);
        for instruction in &plan {
            prop_assert!(instruction.amount.is_positive());
            prop_assert_ne!(&instruction.from_user_id, &instruction.to_user_id);
            // Payments only ever shrink what a pair owes.
            prop_assert!(
                instruction.amount
                    <= outstanding_between(&unpaid, &instruction.from_user_id, &instruction.to_user_id)
            );
        }

        records.extend(plan.iter().map(|i| {
            completed(group_id, &i.from_user_id, &i.to_user_id, i.amount)
        }));
        prop_assert!(plan_settlements(&balances, &records).is_empty());

        // Pending records never change the plan.
        let mut pending = completed(group_id, &members[0], &members[1], Money::new(1_00));
        pending.status = SettlementStatus::Pending;
        records.push(pending);
        prop_assert!(plan_settlements(&balances, &records).is_empty());
    }
}

proptest! {
    #[test]
    fn reconciliation_removes_only_the_target(
        member_count in 2usize..=6,
        amounts in prop::collection::vec(1i64..=100_000, 1..=20),
        payers in prop::collection::vec(0usize..=5, 1..=20),
        masks in prop::collection::vec(0usize..=63, 1..=20),
        kinds in prop::collection::vec(0usize..=3, 1..=20),
        removed_idx in 0usize..=5,
    ) {
        let members = members(member_count);
        let expenses = build_expenses(&members, &amounts, &payers, &masks, &kinds);
        let removed = members[removed_idx % member_count].clone();
        let remaining: Vec<MemberId> = members.iter().filter(|m| **m != removed).cloned().collect();

        let reconciliation = reconcile_after_removal(&expenses, &removed, &remaining).unwrap();

        let touched = expenses.iter().filter(|e| e.has_participant(&removed)).count();
        prop_assert_eq!(
            reconciliation.changed.len() + reconciliation.skipped.len(),
            touched
        );

        for changed in &reconciliation.changed {
            let original = expenses
                .iter()
                .find(|e| e.id == changed.expense.id)
                .unwrap();
            let expected: Vec<&MemberId> = original
                .participants
                .iter()
                .map(|p| &p.member_id)
                .filter(|id| **id != removed)
                .collect();
            let actual: Vec<&MemberId> = changed
                .expense
                .participants
                .iter()
                .map(|p| &p.member_id)
                .collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(changed.expense.amount, original.amount);

            let total = changed.expense.owed_total();
            match changed.expense.split {
                SplitStrategy::Exact => {
                    prop_assert!(total <= changed.expense.amount);
                }
                SplitStrategy::Percentage => {
                    prop_assert_eq!(total, changed.expense.amount);
                    let bps: u32 = changed
                        .expense
                        .participants
                        .iter()
                        .filter_map(|p| p.percentage)
                        .map(|p| p.basis_points())
                        .sum();
                    prop_assert_eq!(bps, 10_000);
                }
                _ => {
                    prop_assert_eq!(total, changed.expense.amount);
                }
            }
        }

        let orphaned = expenses.iter().filter(|e| e.paid_by == removed).count();
        prop_assert_eq!(reconciliation.orphaned_payers.len(), orphaned);
    }
}
