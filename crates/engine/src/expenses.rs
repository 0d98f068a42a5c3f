//! Expense records.
//!
//! The ledger only stores net balances, so the original expense has to be kept
//! around to edit or delete it later. Deleted expenses are voided, not
//! removed.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Expense, Split,
    util::{parse_json, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub payer_id: String,
    pub total: f64,
    pub description: Option<String>,
    pub splits: String,
    pub created_at: DateTimeUtc,
    pub voided_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<(Uuid, &Expense, DateTime<Utc>)> for ActiveModel {
    type Error = EngineError;

    fn try_from(
        (group_id, expense, created_at): (Uuid, &Expense, DateTime<Utc>),
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(group_id.to_string()),
            payer_id: ActiveValue::Set(expense.payer.to_string()),
            total: ActiveValue::Set(expense.total),
            description: ActiveValue::Set(expense.description.clone()),
            splits: ActiveValue::Set(serde_json::to_string(&expense.splits)?),
            created_at: ActiveValue::Set(created_at),
            voided_at: ActiveValue::Set(None),
        })
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let splits: Vec<Split> = parse_json(&model.splits, "expense splits")?;
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            payer: parse_uuid(&model.payer_id, "payer")?.into(),
            total: model.total,
            splits,
            description: model.description,
        })
    }
}
