use sea_orm::{TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, MemberId, Reconciliation, ResultEngine, group_members, reconcile_after_removal,
};

use super::{
    Engine,
    expenses::{active_expenses_of, write_reconciled_expenses},
    groups::{members_of, require_group},
    with_tx,
};

impl Engine {
    /// Removes `member_id` from a group and rewrites the expenses it took
    /// part in, all in one transaction.
    ///
    /// Expenses left without participants and expenses the member paid are
    /// reported in the returned [`Reconciliation`] and logged.
    pub async fn remove_group_member(
        &self,
        group_id: Uuid,
        member_id: &MemberId,
    ) -> ResultEngine<Reconciliation> {
        with_tx!(self, |db_tx| {
            require_group(&db_tx, group_id).await?;
            let members = members_of(&db_tx, group_id).await?;
            if !members.contains(member_id) {
                return Err(EngineError::InvalidMember(format!(
                    "{member_id} is not a member of the group"
                )));
            }
            let remaining: Vec<MemberId> = members
                .into_iter()
                .filter(|m| m != member_id)
                .collect();

            let expenses = active_expenses_of(&db_tx, group_id).await?;
            let reconciliation = reconcile_after_removal(&expenses, member_id, &remaining)?;

            group_members::Entity::delete_by_id((group_id.to_string(), member_id.to_string()))
                .exec(&db_tx)
                .await?;
            write_reconciled_expenses(&db_tx, &reconciliation.changed).await?;

            for expense_id in &reconciliation.skipped {
                tracing::warn!(
                    %group_id,
                    %expense_id,
                    %member_id,
                    "expense has no participants left, not rewritten"
                );
            }
            for expense_id in &reconciliation.orphaned_payers {
                tracing::warn!(
                    %group_id,
                    %expense_id,
                    %member_id,
                    "removed member paid an active expense"
                );
            }
            tracing::info!(
                %group_id,
                %member_id,
                rewritten = reconciliation.changed.len(),
                "member removed"
            );
            Ok(reconciliation)
        })
    }
}
