use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, MemberId, Money, ResultEngine, SettlementRecord, SettlementStatus, settlements,
    validate_payment,
};

use super::{
    Engine,
    balances::outstanding_of,
    groups::{ensure_members, members_of, require_group},
    with_tx,
};

/// Settlements of a group with the given status, oldest first.
pub(super) async fn settlements_of<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
    status: SettlementStatus,
) -> ResultEngine<Vec<SettlementRecord>> {
    settlements::Entity::find()
        .filter(settlements::Column::GroupId.eq(group_id.to_string()))
        .filter(settlements::Column::Status.eq(status.as_str()))
        .order_by_asc(settlements::Column::CreatedAt)
        .order_by_asc(settlements::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(SettlementRecord::try_from)
        .collect()
}

pub(super) async fn insert_settlement<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
    from: &MemberId,
    to: &MemberId,
    amount: Money,
    status: SettlementStatus,
) -> ResultEngine<SettlementRecord> {
    let record = SettlementRecord::new(
        group_id,
        from.clone(),
        to.clone(),
        amount,
        status,
        Utc::now(),
    )?;
    settlements::ActiveModel::from(&record).insert(db).await?;
    Ok(record)
}

impl Engine {
    pub async fn completed_settlements(
        &self,
        group_id: Uuid,
    ) -> ResultEngine<Vec<SettlementRecord>> {
        require_group(&self.database, group_id).await?;
        settlements_of(&self.database, group_id, SettlementStatus::Completed).await
    }

    pub async fn pending_settlements(&self, group_id: Uuid) -> ResultEngine<Vec<SettlementRecord>> {
        require_group(&self.database, group_id).await?;
        settlements_of(&self.database, group_id, SettlementStatus::Pending).await
    }

    /// Stores a settlement between two current members.
    ///
    /// Unlike [`Engine::settle_up`] the amount is not checked against what
    /// is outstanding; pending records are confirmed through
    /// [`Engine::update_payment_status`], which does check it.
    pub async fn record_settlement(
        &self,
        group_id: Uuid,
        from: &MemberId,
        to: &MemberId,
        amount: Money,
        status: SettlementStatus,
    ) -> ResultEngine<SettlementRecord> {
        with_tx!(self, |db_tx| {
            require_group(&db_tx, group_id).await?;
            let members = members_of(&db_tx, group_id).await?;
            ensure_members(&members, [from, to])?;

            let record = insert_settlement(&db_tx, group_id, from, to, amount, status).await?;

            tracing::debug!(
                settlement_id = %record.id,
                %group_id,
                status = status.as_str(),
                "settlement recorded"
            );
            Ok(record)
        })
    }

    /// Moves a settlement to `status`.
    ///
    /// Confirming a pending payment fails with `ExceedsOutstanding` when it
    /// is larger than what the payer still owes the receiver.
    pub async fn update_payment_status(
        &self,
        settlement_id: Uuid,
        status: SettlementStatus,
    ) -> ResultEngine<SettlementRecord> {
        with_tx!(self, |db_tx| {
            let model = settlements::Entity::find_by_id(settlement_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("settlement {settlement_id}")))?;
            let mut record = SettlementRecord::try_from(model)?;
            if record.status == status {
                return Ok(record);
            }

            if status == SettlementStatus::Completed {
                // Pending records are not part of the plan yet.
                let plan = outstanding_of(&db_tx, record.group_id).await?;
                validate_payment(&plan, &record.from_user_id, &record.to_user_id, record.amount)?;
            }

            record.status = status;
            record.updated_at = Utc::now();
            settlements::ActiveModel::from(&record).update(&db_tx).await?;

            tracing::info!(
                %settlement_id,
                group_id = %record.group_id,
                status = status.as_str(),
                "payment status updated"
            );
            Ok(record)
        })
    }
}
