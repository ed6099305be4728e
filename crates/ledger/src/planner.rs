//! Settlement planning.
//!
//! [`plan_settlements`] turns net balances into the transfers still needed
//! to bring every member to zero:
//!
//! 1. debtors and creditors are matched with a single greedy scan in
//!    membership order, emitting one instruction per non-zero transfer;
//! 2. completed settlements are deducted from the instruction of the same
//!    ordered pair. Covered instructions are dropped, and a payment never
//!    adds or grows an instruction. Pending records are ignored.
//!
//! The scan is deterministic but does not minimize the number of transfers
//! in every topology.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Balances, EngineError, MemberId, Money, ResultEngine, SettlementRecord};

/// A transfer still required to settle the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub from_user_id: MemberId,
    pub to_user_id: MemberId,
    pub amount: Money,
}

/// Computes the outstanding transfers for `balances`, net of `completed`.
///
/// Records that are not completed are ignored, as are completed records
/// whose ordered pair the scan does not match.
pub fn plan_settlements(
    balances: &Balances,
    completed: &[SettlementRecord],
) -> Vec<SettlementInstruction> {
    let mut paid: HashMap<(MemberId, MemberId), Money> = HashMap::new();
    for record in completed.iter().filter(|r| r.is_completed()) {
        *paid
            .entry((record.from_user_id.clone(), record.to_user_id.clone()))
            .or_default() += record.amount;
    }

    greedy_transfers(balances)
        .into_iter()
        .filter_map(|mut instruction| {
            let pair = (
                instruction.from_user_id.clone(),
                instruction.to_user_id.clone(),
            );
            let covered = paid.get(&pair).copied().unwrap_or_default();
            instruction.amount = (instruction.amount - covered).max(Money::ZERO);
            instruction.amount.is_positive().then_some(instruction)
        })
        .collect()
}

/// Matches debtors to creditors in membership order. Every ordered pair
/// appears at most once.
fn greedy_transfers(balances: &Balances) -> Vec<SettlementInstruction> {
    let mut debtors: Vec<(&MemberId, Money)> = balances
        .iter()
        .filter(|(_, b)| b.net.is_negative())
        .map(|(id, b)| (id, b.net.abs()))
        .collect();
    let mut creditors: Vec<(&MemberId, Money)> = balances
        .iter()
        .filter(|(_, b)| b.net.is_positive())
        .map(|(id, b)| (id, b.net))
        .collect();

    let mut instructions = Vec::new();
    for (debtor, debt) in &mut debtors {
        for (creditor, credit) in &mut creditors {
            if debt.is_zero() {
                break;
            }
            let amount = (*debt).min(*credit);
            if amount.is_zero() {
                continue;
            }
            *debt -= amount;
            *credit -= amount;
            instructions.push(SettlementInstruction {
                from_user_id: (*debtor).clone(),
                to_user_id: (*creditor).clone(),
                amount,
            });
        }
    }

    instructions
}

/// Total still owed by `from` to `to` according to `plan`.
pub fn outstanding_between(
    plan: &[SettlementInstruction],
    from: &MemberId,
    to: &MemberId,
) -> Money {
    plan.iter()
        .filter(|i| &i.from_user_id == from && &i.to_user_id == to)
        .map(|i| i.amount)
        .sum()
}

/// Validates a custom (possibly partial) payment from `from` to `to`.
///
/// The amount must be positive and no larger than what `from` still owes
/// `to` in `plan`.
pub fn validate_payment(
    plan: &[SettlementInstruction],
    from: &MemberId,
    to: &MemberId,
    amount: Money,
) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount("invalid amount".to_string()));
    }
    if from == to {
        return Err(EngineError::InvalidMember(format!(
            "{from} cannot settle with themselves"
        )));
    }
    let outstanding = outstanding_between(plan, from, to);
    if amount > outstanding {
        return Err(EngineError::ExceedsOutstanding(format!(
            "{from} owes {to} {outstanding}, got {amount}"
        )));
    }
    Ok(())
}
