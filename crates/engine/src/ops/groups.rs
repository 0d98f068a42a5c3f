use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, GroupLedger, GroupState, IndexMap, Member, ParticipantId, ResultEngine, expenses,
    groups, members,
    util::{normalize_required_name, parse_json, parse_uuid},
};

use super::{Engine, with_tx};

/// A group with its members in ledger slot order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: Uuid,
    pub name: String,
    pub members: Vec<Member>,
}

impl Engine {
    /// Creates an empty group and returns its id.
    pub async fn new_group(&self, name: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "group")?;
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            groups::ActiveModel {
                id: ActiveValue::Set(id.to_string()),
                name: ActiveValue::Set(name.clone()),
                ledger: ActiveValue::Set(serde_json::to_string(&Vec::<f64>::new())?),
                slots: ActiveValue::Set(Some(serde_json::to_string(&IndexMap::new())?)),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(group = %id, %name, "group created");
            Ok(id)
        })
    }

    /// Lists every group as `(id, name)`, oldest first.
    pub async fn list_groups(&self) -> ResultEngine<Vec<(Uuid, String)>> {
        let rows = groups::Entity::find()
            .order_by_asc(groups::Column::CreatedAt)
            .all(&self.database)
            .await?;
        rows.into_iter()
            .map(|row| Ok((parse_uuid(&row.id, "group")?, row.name)))
            .collect()
    }

    /// Returns a group with its members.
    pub async fn group(&self, group_id: Uuid) -> ResultEngine<GroupSnapshot> {
        with_tx!(self, |db_tx| {
            let (model, ledger) = self.load_group(&db_tx, group_id).await?;
            let members = self.ordered_members(&db_tx, group_id, &ledger).await?;
            Ok(GroupSnapshot {
                id: group_id,
                name: model.name,
                members,
            })
        })
    }

    /// Deletes a group with its members and expenses.
    pub async fn delete_group(&self, group_id: Uuid) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            expenses::Entity::delete_many()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .exec(&db_tx)
                .await?;
            members::Entity::delete_many()
                .filter(members::Column::GroupId.eq(group_id.to_string()))
                .exec(&db_tx)
                .await?;
            groups::Entity::delete_by_id(group_id.to_string())
                .exec(&db_tx)
                .await?;
            tracing::info!(group = %group_id, "group deleted");
            Ok(())
        })
    }

    pub(super) async fn require_group(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    pub(super) async fn member_rows(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<members::Model>> {
        Ok(members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(members::Column::Position)
            .all(db_tx)
            .await?)
    }

    /// Loads a group row and rebuilds its ledger.
    ///
    /// When `slots` is stored it is authoritative and must cover exactly the
    /// member rows. Older rows without it fall back to member position order.
    pub(super) async fn load_group(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<(groups::Model, GroupLedger)> {
        let model = self.require_group(db_tx, group_id).await?;
        let cells: Vec<f64> = parse_json(&model.ledger, "ledger")?;
        let rows = self.member_rows(db_tx, group_id).await?;
        let stored: Vec<ParticipantId> = rows
            .iter()
            .map(|row| parse_uuid(&row.participant_id, "participant").map(ParticipantId::from))
            .collect::<ResultEngine<_>>()?;

        let ledger = match model.slots.as_deref() {
            Some(slots) => {
                let slots: IndexMap = parse_json(slots, "slots")?;
                let expected: HashSet<_> = stored.iter().copied().collect();
                let mapped: HashSet<_> = slots.participants().collect();
                if expected != mapped {
                    return Err(EngineError::CorruptState(format!(
                        "slots of group {group_id} do not match its members"
                    )));
                }
                GroupLedger::from_state(GroupState {
                    slots,
                    ledger: cells,
                })?
            }
            None => GroupLedger::from_members(stored, cells)?,
        };
        Ok((model, ledger))
    }

    /// Stores the ledger cells and slot map back on the group row.
    pub(super) async fn save_ledger(
        &self,
        db_tx: &DatabaseTransaction,
        model: groups::Model,
        ledger: &GroupLedger,
    ) -> ResultEngine<()> {
        let state = ledger.state();
        let mut active: groups::ActiveModel = model.into();
        active.ledger = ActiveValue::Set(serde_json::to_string(&state.ledger)?);
        active.slots = ActiveValue::Set(Some(serde_json::to_string(&state.slots)?));
        active.update(db_tx).await?;
        Ok(())
    }

    /// Members in ledger slot order.
    pub(super) async fn ordered_members(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: Uuid,
        ledger: &GroupLedger,
    ) -> ResultEngine<Vec<Member>> {
        let mut by_id = HashMap::new();
        for row in self.member_rows(db_tx, group_id).await? {
            let member = Member::try_from(row)?;
            by_id.insert(member.id, member);
        }
        ledger
            .members()
            .into_iter()
            .map(|id| by_id.remove(&id).ok_or(EngineError::UnknownParticipant(id)))
            .collect()
    }
}
