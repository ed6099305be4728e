use sea_orm::{ConnectionTrait, TransactionTrait};
use uuid::Uuid;

use crate::{
    Balances, MemberId, Money, ResultEngine, SettlementInstruction, SettlementRecord,
    SettlementStatus, compute_balances, plan_settlements, validate_payment,
};

use super::{
    Engine, SettlementPlan,
    expenses::active_expenses_of,
    groups::{ensure_members, members_of, require_group},
    settlements::{insert_settlement, settlements_of},
    with_tx,
};

/// Balances of a group from its current members and active expenses.
pub(super) async fn balances_of<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
) -> ResultEngine<Balances> {
    let members = members_of(db, group_id).await?;
    let expenses = active_expenses_of(db, group_id).await?;
    let balances = compute_balances(&expenses, &members);

    for dropped in balances.dropped() {
        tracing::warn!(
            %group_id,
            expense_id = %dropped.expense_id,
            member_id = %dropped.member_id,
            kind = ?dropped.kind,
            amount = %dropped.amount,
            "contribution from a non-member ignored"
        );
    }
    Ok(balances)
}

/// Transfers still outstanding, net of completed settlements.
pub(super) async fn outstanding_of<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
) -> ResultEngine<Vec<SettlementInstruction>> {
    let balances = balances_of(db, group_id).await?;
    let completed = settlements_of(db, group_id, SettlementStatus::Completed).await?;
    Ok(plan_settlements(&balances, &completed))
}

impl Engine {
    /// Net position of every current member.
    pub async fn group_balances(&self, group_id: Uuid) -> ResultEngine<Balances> {
        require_group(&self.database, group_id).await?;
        balances_of(&self.database, group_id).await
    }

    /// Outstanding transfers plus the payments waiting for confirmation.
    pub async fn settlement_plan(&self, group_id: Uuid) -> ResultEngine<SettlementPlan> {
        require_group(&self.database, group_id).await?;
        let instructions = outstanding_of(&self.database, group_id).await?;
        let pending = settlements_of(&self.database, group_id, SettlementStatus::Pending).await?;
        Ok(SettlementPlan {
            instructions,
            pending,
        })
    }

    /// Records a completed payment of `amount` from `from` to `to`.
    ///
    /// The amount may be partial but never more than what `from` still owes
    /// `to`. The check and the insert share one transaction.
    pub async fn settle_up(
        &self,
        group_id: Uuid,
        from: &MemberId,
        to: &MemberId,
        amount: Money,
    ) -> ResultEngine<SettlementRecord> {
        with_tx!(self, |db_tx| {
            require_group(&db_tx, group_id).await?;
            let members = members_of(&db_tx, group_id).await?;
            ensure_members(&members, [from, to])?;

            let plan = outstanding_of(&db_tx, group_id).await?;
            validate_payment(&plan, from, to, amount)?;

            let record = insert_settlement(
                &db_tx,
                group_id,
                from,
                to,
                amount,
                SettlementStatus::Completed,
            )
            .await?;

            tracing::info!(
                settlement_id = %record.id,
                %group_id,
                %from,
                %to,
                %amount,
                "settlement completed"
            );
            Ok(record)
        })
    }
}
