use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, Expense, ParticipantId, ResultEngine, Split, expenses,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

/// Input for [`Engine::add_expense`].
#[derive(Clone, Debug, PartialEq)]
pub struct AddExpenseCmd {
    pub group_id: Uuid,
    pub payer: ParticipantId,
    pub total: f64,
    pub splits: Vec<Split>,
    pub description: Option<String>,
}

/// Input for [`Engine::update_expense`]. The expense keeps its id.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateExpenseCmd {
    pub group_id: Uuid,
    pub expense_id: Uuid,
    pub payer: ParticipantId,
    pub total: f64,
    pub splits: Vec<Split>,
    pub description: Option<String>,
}

impl Engine {
    /// Records an expense and adds its debts to the group ledger.
    pub async fn add_expense(&self, cmd: AddExpenseCmd) -> ResultEngine<Expense> {
        let AddExpenseCmd {
            group_id,
            payer,
            total,
            splits,
            description,
        } = cmd;
        let expense = Expense::new(payer, total, splits)
            .with_description(normalize_optional_text(description.as_deref()));

        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (model, mut ledger) = self.load_group(&db_tx, group_id).await?;
            let expense = ledger.add_expense(expense)?;
            expenses::ActiveModel::try_from((group_id, &expense, Utc::now()))?
                .insert(&db_tx)
                .await?;
            self.save_ledger(&db_tx, model, &ledger).await?;

            tracing::info!(
                group = %group_id,
                expense = %expense.id,
                total = expense.total,
                "expense added"
            );
            Ok(expense)
        })
    }

    /// Replaces an expense: its old debts are reversed and the new ones
    /// applied, atomically.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        let UpdateExpenseCmd {
            group_id,
            expense_id,
            payer,
            total,
            splits,
            description,
        } = cmd;

        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (model, mut ledger) = self.load_group(&db_tx, group_id).await?;
            let row = self.require_expense(&db_tx, group_id, expense_id).await?;
            let old = Expense::try_from(row.clone())?;

            let mut new = Expense::new(payer, total, splits)
                .with_description(normalize_optional_text(description.as_deref()));
            new.id = old.id;
            let new = ledger.update_expense(&old, new)?;

            let mut active: expenses::ActiveModel = row.into();
            active.payer_id = ActiveValue::Set(new.payer.to_string());
            active.total = ActiveValue::Set(new.total);
            active.description = ActiveValue::Set(new.description.clone());
            active.splits = ActiveValue::Set(serde_json::to_string(&new.splits)?);
            active.update(&db_tx).await?;
            self.save_ledger(&db_tx, model, &ledger).await?;

            tracing::info!(group = %group_id, expense = %expense_id, "expense updated");
            Ok(new)
        })
    }

    /// Voids an expense and removes its debts from the ledger.
    pub async fn delete_expense(&self, group_id: Uuid, expense_id: Uuid) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (model, mut ledger) = self.load_group(&db_tx, group_id).await?;
            let row = self.require_expense(&db_tx, group_id, expense_id).await?;
            let expense = Expense::try_from(row.clone())?;
            ledger.delete_expense(&expense)?;

            let mut active: expenses::ActiveModel = row.into();
            active.voided_at = ActiveValue::Set(Some(Utc::now()));
            active.update(&db_tx).await?;
            self.save_ledger(&db_tx, model, &ledger).await?;

            tracing::info!(group = %group_id, expense = %expense_id, "expense deleted");
            Ok(())
        })
    }

    /// Live (non voided) expenses of a group, oldest first.
    pub async fn expenses(&self, group_id: Uuid) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let rows = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .filter(expenses::Column::VoidedAt.is_null())
                .order_by_asc(expenses::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            rows.into_iter()
                .map(Expense::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    async fn require_expense(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
        expense_id: Uuid,
    ) -> ResultEngine<expenses::Model> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .filter(expenses::Column::VoidedAt.is_null())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }
}
