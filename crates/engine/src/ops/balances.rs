use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Debt, Member, ParticipantId, ResultEngine};

use super::{Engine, with_tx};

/// Per member balance summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberTotals {
    pub member: Member,
    pub owed_by: f64,
    pub owed_to: f64,
    pub net: f64,
}

impl Engine {
    /// Marks the balance between `debtor` and `creditor` as paid out of band.
    ///
    /// The pair's balance is zeroed whichever way it pointed; the returned
    /// debt says which way that was, `None` if they were already even.
    pub async fn settle(
        &self,
        group_id: Uuid,
        debtor: ParticipantId,
        creditor: ParticipantId,
    ) -> ResultEngine<Option<Debt>> {
        let settled = self
            .mutate_group(group_id, |ledger| ledger.settle(debtor, creditor))
            .await?;
        match &settled {
            Some(debt) => tracing::info!(
                group = %group_id,
                debtor = %debt.debtor,
                creditor = %debt.creditor,
                amount = debt.amount,
                "pair settled"
            ),
            None => tracing::info!(group = %group_id, %debtor, %creditor, "pair already even"),
        }
        Ok(settled)
    }

    /// How much `debtor` owes `creditor` right now.
    pub async fn debt_between(
        &self,
        group_id: Uuid,
        debtor: ParticipantId,
        creditor: ParticipantId,
    ) -> ResultEngine<f64> {
        with_tx!(self, |db_tx| {
            let (_, ledger) = self.load_group(&db_tx, group_id).await?;
            ledger.debt_between(debtor, creditor)
        })
    }

    /// Every outstanding debt of the group.
    pub async fn debts(&self, group_id: Uuid) -> ResultEngine<Vec<Debt>> {
        with_tx!(self, |db_tx| {
            let (_, ledger) = self.load_group(&db_tx, group_id).await?;
            ledger.all_debts()
        })
    }

    /// Owed/owing totals for every member, in slot order.
    pub async fn member_totals(&self, group_id: Uuid) -> ResultEngine<Vec<MemberTotals>> {
        with_tx!(self, |db_tx| {
            let (_, ledger) = self.load_group(&db_tx, group_id).await?;
            let members = self.ordered_members(&db_tx, group_id, &ledger).await?;
            members
                .into_iter()
                .map(|member| {
                    Ok(MemberTotals {
                        owed_by: ledger.total_owed_by(member.id)?,
                        owed_to: ledger.total_owed_to(member.id)?,
                        net: ledger.net_balance(member.id)?,
                        member,
                    })
                })
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
