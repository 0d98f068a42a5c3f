use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, GroupLedger, ParticipantId, ResultEngine, members,
    util::{normalize_required_name, parse_uuid},
};

use super::{Engine, with_tx};

impl Engine {
    /// Adds a member to a group and returns their new participant id.
    ///
    /// Names are unique inside a group.
    pub async fn add_member(&self, group_id: Uuid, name: &str) -> ResultEngine<ParticipantId> {
        let name = normalize_required_name(name, "member")?;
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (model, mut ledger) = self.load_group(&db_tx, group_id).await?;
            if self.find_member(&db_tx, group_id, &name).await?.is_some() {
                return Err(EngineError::ExistingKey(name));
            }

            let participant = ParticipantId::new();
            let slot = ledger.add_member(participant)?;
            members::ActiveModel {
                group_id: ActiveValue::Set(group_id.to_string()),
                participant_id: ActiveValue::Set(participant.to_string()),
                name: ActiveValue::Set(name.clone()),
                position: ActiveValue::Set(position(slot)?),
            }
            .insert(&db_tx)
            .await?;
            self.save_ledger(&db_tx, model, &ledger).await?;

            tracing::info!(group = %group_id, %participant, %name, slot, "member joined");
            Ok(participant)
        })
    }

    /// Removes a member. Fails with `UnsettledDebt` while they still owe or
    /// are owed money by anyone in the group.
    pub async fn remove_member(
        &self,
        group_id: Uuid,
        participant: ParticipantId,
    ) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (model, mut ledger) = self.load_group(&db_tx, group_id).await?;
            if let Err(err) = ledger.remove_member(participant) {
                if matches!(err, EngineError::UnsettledDebt { .. }) {
                    tracing::warn!(group = %group_id, %participant, "removal rejected: {err}");
                }
                return Err(err);
            }

            members::Entity::delete_by_id((group_id.to_string(), participant.to_string()))
                .exec(&db_tx)
                .await?;
            self.sync_positions(&db_tx, group_id, &ledger).await?;
            self.save_ledger(&db_tx, model, &ledger).await?;

            tracing::info!(group = %group_id, %participant, "member left");
            Ok(())
        })
    }

    /// Resolves a member name to its participant id.
    pub async fn member_id(&self, group_id: Uuid, name: &str) -> ResultEngine<ParticipantId> {
        let name = normalize_required_name(name, "member")?;
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let row = self
                .find_member(&db_tx, group_id, &name)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(name.clone()))?;
            Ok(parse_uuid(&row.participant_id, "participant")?.into())
        })
    }

    async fn find_member(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
        name: &str,
    ) -> ResultEngine<Option<members::Model>> {
        Ok(members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id.to_string()))
            .filter(members::Column::Name.eq(name))
            .one(db_tx)
            .await?)
    }

    /// Keeps every member's `position` equal to their slot after a resize.
    async fn sync_positions(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
        ledger: &GroupLedger,
    ) -> ResultEngine<()> {
        for (slot, participant) in ledger.members().into_iter().enumerate() {
            members::Entity::update_many()
                .col_expr(members::Column::Position, Expr::value(position(slot)?))
                .filter(members::Column::GroupId.eq(group_id.to_string()))
                .filter(members::Column::ParticipantId.eq(participant.to_string()))
                .exec(db_tx)
                .await?;
        }
        Ok(())
    }
}

fn position(slot: usize) -> ResultEngine<i32> {
    i32::try_from(slot).map_err(|_| EngineError::IndexOutOfRange {
        a: slot,
        b: slot,
        size: slot,
    })
}
