use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Expense, ExpenseEdit, NewExpense, ReconciledExpense, ResultEngine, expenses,
    participants,
};

use super::{
    Engine,
    groups::{adjust_group_total, ensure_members, members_of, require_group},
    with_tx,
};

/// Attaches participant rows to expense models, keeping the models' order.
async fn hydrate<C: ConnectionTrait>(
    db: &C,
    models: Vec<expenses::Model>,
) -> ResultEngine<Vec<Expense>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
    let rows = participants::Entity::find()
        .filter(participants::Column::ExpenseId.is_in(ids))
        .order_by_asc(participants::Column::ExpenseId)
        .order_by_asc(participants::Column::Position)
        .all(db)
        .await?;

    let mut by_expense: HashMap<String, Vec<participants::Model>> = HashMap::new();
    for row in rows {
        by_expense.entry(row.expense_id.clone()).or_default().push(row);
    }

    models
        .into_iter()
        .map(|model| {
            let rows = by_expense.remove(&model.id).unwrap_or_default();
            Expense::try_from((model, rows))
        })
        .collect()
}

/// Active expenses of a group in creation order.
pub(super) async fn active_expenses_of<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
) -> ResultEngine<Vec<Expense>> {
    let models = expenses::Entity::find()
        .filter(expenses::Column::GroupId.eq(group_id.to_string()))
        .filter(expenses::Column::IsActive.eq(true))
        .order_by_asc(expenses::Column::CreatedAt)
        .order_by_asc(expenses::Column::Id)
        .all(db)
        .await?;
    hydrate(db, models).await
}

async fn require_expense<C: ConnectionTrait>(db: &C, expense_id: Uuid) -> ResultEngine<Expense> {
    let model = expenses::Entity::find_by_id(expense_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))?;
    hydrate(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))
}

async fn replace_participants<C: ConnectionTrait>(db: &C, expense: &Expense) -> ResultEngine<()> {
    participants::Entity::delete_many()
        .filter(participants::Column::ExpenseId.eq(expense.id.to_string()))
        .exec(db)
        .await?;
    let rows = participants::active_models(expense.id, &expense.participants);
    if !rows.is_empty() {
        participants::Entity::insert_many(rows)
            .exec_without_returning(db)
            .await?;
    }
    Ok(())
}

/// Rewrites the participants (and audit note) of reconciled expenses.
///
/// Expected to run inside the transaction that removes the membership.
pub(super) async fn write_reconciled_expenses<C: ConnectionTrait>(
    db: &C,
    changed: &[ReconciledExpense],
) -> ResultEngine<()> {
    let now = Utc::now();
    for reconciled in changed {
        let mut expense = reconciled.expense.clone();
        expense.updated_at = now;
        expense.reconciliation_note = Some(reconciled.note.clone());
        expenses::ActiveModel::from(&expense).update(db).await?;
        replace_participants(db, &expense).await?;
    }
    Ok(())
}

impl Engine {
    /// Records a new expense. Payer and participants must be current members.
    pub async fn add_expense(&self, group_id: Uuid, new: NewExpense) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let group = require_group(&db_tx, group_id).await?;
            let members = members_of(&db_tx, group_id).await?;
            ensure_members(&members, [&new.paid_by])?;
            ensure_members(&members, new.split.members())?;

            let expense = Expense::new(
                group_id,
                &new.description,
                new.amount,
                new.paid_by,
                &new.split,
                Utc::now(),
            )?;

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            replace_participants(&db_tx, &expense).await?;
            adjust_group_total(&db_tx, group, expense.amount).await?;

            tracing::debug!(
                expense_id = %expense.id,
                %group_id,
                amount = %expense.amount,
                split = expense.split.as_str(),
                "expense added"
            );
            Ok(expense.id)
        })
    }

    /// Applies a user edit to an active expense.
    pub async fn update_expense(&self, expense_id: Uuid, edit: ExpenseEdit) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let mut expense = require_expense(&db_tx, expense_id).await?;
            if !expense.is_active {
                return Err(EngineError::KeyNotFound(format!(
                    "active expense {expense_id}"
                )));
            }
            let group = require_group(&db_tx, expense.group_id).await?;
            let members = members_of(&db_tx, expense.group_id).await?;
            let old_amount = expense.amount;
            // Only newly assigned parties must be current members; a
            // description edit on an expense of a departed member is fine.
            let new_payer = edit.paid_by.is_some();
            let resplit = edit.split.is_some() || edit.amount.is_some_and(|a| a != old_amount);

            expense.apply_edit(edit, Utc::now())?;
            if new_payer {
                ensure_members(&members, [&expense.paid_by])?;
            }
            if resplit {
                ensure_members(&members, expense.participants.iter().map(|p| &p.member_id))?;
            }

            expenses::ActiveModel::from(&expense).update(&db_tx).await?;
            replace_participants(&db_tx, &expense).await?;
            adjust_group_total(&db_tx, group, expense.amount - old_amount).await?;

            tracing::debug!(%expense_id, amount = %expense.amount, "expense updated");
            Ok(expense)
        })
    }

    /// Soft-deletes an expense. Deleting an inactive expense is a no-op.
    pub async fn deactivate_expense(&self, expense_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let mut expense = require_expense(&db_tx, expense_id).await?;
            if !expense.is_active {
                return Ok(());
            }
            let group = require_group(&db_tx, expense.group_id).await?;

            expense.is_active = false;
            expense.updated_at = Utc::now();
            expenses::ActiveModel::from(&expense).update(&db_tx).await?;
            adjust_group_total(&db_tx, group, -expense.amount).await?;

            tracing::debug!(%expense_id, "expense deactivated");
            Ok(())
        })
    }

    pub async fn expense(&self, expense_id: Uuid) -> ResultEngine<Expense> {
        require_expense(&self.database, expense_id).await
    }

    /// Active expenses of a group in creation order.
    pub async fn active_expenses(&self, group_id: Uuid) -> ResultEngine<Vec<Expense>> {
        require_group(&self.database, group_id).await?;
        active_expenses_of(&self.database, group_id).await
    }
}
