//! The per-group ledger facade.
//!
//! [`GroupLedger`] pairs one [`IndexMap`] with one [`DebtLedger`] and
//! sequences the expense, settlement and membership operations on them. All
//! validation lives in the lower modules; the facade only guarantees that a
//! failed operation leaves it untouched.

use serde::{Deserialize, Serialize};

use crate::{
    DebtLedger, EngineError, Expense, IndexMap, ParticipantId, ResultEngine, expense, resize,
};

/// One directed outstanding balance between two participants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub debtor: ParticipantId,
    pub creditor: ParticipantId,
    pub amount: f64,
}

/// Serialized form of a group ledger.
///
/// `ledger` holds the cells in canonical index order; `slots` maps every
/// member to the slot those cells are addressed with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub slots: IndexMap,
    pub ledger: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupLedger {
    index_map: IndexMap,
    ledger: DebtLedger,
}

impl GroupLedger {
    /// A group with no members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the ledger from persisted state, checking that slots and cells
    /// agree.
    pub fn from_state(state: GroupState) -> ResultEngine<Self> {
        let GroupState { slots, ledger } = state;
        if !slots.is_dense() {
            return Err(EngineError::CorruptState(
                "slots are not contiguous".to_string(),
            ));
        }
        let ledger = DebtLedger::from_cells(slots.len(), ledger)?;
        Ok(Self {
            index_map: slots,
            ledger,
        })
    }

    /// Rebuilds the ledger when only the ordered member list was stored.
    pub fn from_members<I>(members: I, cells: Vec<f64>) -> ResultEngine<Self>
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        Self::from_state(GroupState {
            slots: IndexMap::from_members(members)?,
            ledger: cells,
        })
    }

    pub fn state(&self) -> GroupState {
        GroupState {
            slots: self.index_map.clone(),
            ledger: self.ledger.cells().to_vec(),
        }
    }

    /// Members in slot order.
    pub fn members(&self) -> Vec<ParticipantId> {
        self.index_map.participants().collect()
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    pub fn add_expense(&mut self, expense: Expense) -> ResultEngine<Expense> {
        expense::apply(&mut self.ledger, &self.index_map, &expense)?;
        Ok(expense)
    }

    /// Replaces `old` with `new`. On error the ledger is unchanged.
    pub fn update_expense(&mut self, old: &Expense, new: Expense) -> ResultEngine<Expense> {
        let mut ledger = self.ledger.clone();
        expense::update(&mut ledger, &self.index_map, old, &new)?;
        self.ledger = ledger;
        Ok(new)
    }

    pub fn delete_expense(&mut self, expense: &Expense) -> ResultEngine<()> {
        expense::reverse(&mut self.ledger, &self.index_map, expense)
    }

    /// Adds a member with a clean balance and returns its slot.
    pub fn add_member(&mut self, participant: ParticipantId) -> ResultEngine<usize> {
        let mut index_map = self.index_map.clone();
        let slot = index_map.add(participant)?;
        let ledger = resize::grow(&self.ledger, index_map.len())?;
        self.index_map = index_map;
        self.ledger = ledger;
        tracing::debug!(%participant, slot, "member added to ledger");
        Ok(slot)
    }

    /// Removes a member. Fails with `UnsettledDebt` while they owe or are
    /// owed anything.
    pub fn remove_member(&mut self, participant: ParticipantId) -> ResultEngine<()> {
        let slot = self.index_map.slot_of(participant)?;
        let ledger = resize::shrink(&self.ledger, &self.index_map, &[slot])?;
        let mut index_map = self.index_map.clone();
        index_map.remove(participant)?;
        index_map.compact();
        self.index_map = index_map;
        self.ledger = ledger;
        tracing::debug!(%participant, slot, "member removed from ledger");
        Ok(())
    }

    /// Clears the balance between two members, whichever way it pointed, and
    /// returns the debt that was cleared. `None` if the pair was already even.
    pub fn settle(
        &mut self,
        debtor: ParticipantId,
        creditor: ParticipantId,
    ) -> ResultEngine<Option<Debt>> {
        let (d, c) = self.slots(debtor, creditor)?;
        let owed = self.ledger.debt_of(d, c)?;
        let owing = self.ledger.debt_of(c, d)?;
        self.ledger.settle_pair(d, c)?;
        let cleared = if owed > 0.0 {
            Some(Debt {
                debtor,
                creditor,
                amount: owed,
            })
        } else if owing > 0.0 {
            Some(Debt {
                debtor: creditor,
                creditor: debtor,
                amount: owing,
            })
        } else {
            None
        };
        Ok(cleared)
    }

    pub fn debt_between(
        &self,
        debtor: ParticipantId,
        creditor: ParticipantId,
    ) -> ResultEngine<f64> {
        let (d, c) = self.slots(debtor, creditor)?;
        self.ledger.debt_of(d, c)
    }

    pub fn all_debts(&self) -> ResultEngine<Vec<Debt>> {
        self.ledger
            .all_nonzero_debts()
            .into_iter()
            .map(|debt| {
                Ok(Debt {
                    debtor: self.participant_at(debt.debtor)?,
                    creditor: self.participant_at(debt.creditor)?,
                    amount: debt.amount,
                })
            })
            .collect()
    }

    pub fn total_owed_to(&self, participant: ParticipantId) -> ResultEngine<f64> {
        self.ledger.total_owed_to(self.index_map.slot_of(participant)?)
    }

    pub fn total_owed_by(&self, participant: ParticipantId) -> ResultEngine<f64> {
        self.ledger.total_owed_by(self.index_map.slot_of(participant)?)
    }

    /// What the group owes `participant` minus what they owe the group.
    pub fn net_balance(&self, participant: ParticipantId) -> ResultEngine<f64> {
        self.ledger.net_balance(self.index_map.slot_of(participant)?)
    }

    fn slots(&self, a: ParticipantId, b: ParticipantId) -> ResultEngine<(usize, usize)> {
        Ok((self.index_map.slot_of(a)?, self.index_map.slot_of(b)?))
    }

    fn participant_at(&self, slot: usize) -> ResultEngine<ParticipantId> {
        self.index_map
            .participant_at(slot)
            .ok_or(EngineError::IndexOutOfRange {
                a: slot,
                b: slot,
                size: self.ledger.size(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Split;

    fn group(n: usize) -> (GroupLedger, Vec<ParticipantId>) {
        let mut group = GroupLedger::new();
        let ids: Vec<_> = (0..n).map(|_| ParticipantId::new()).collect();
        for id in &ids {
            group.add_member(*id).unwrap();
        }
        (group, ids)
    }

    fn split(debtor: ParticipantId, amount: f64) -> Split {
        Split { debtor, amount }
    }

    #[test]
    fn household_scenario() {
        let (mut group, ids) = group(3);
        let [a, b, c] = [ids[0], ids[1], ids[2]];

        group
            .add_expense(Expense::new(
                a,
                90.0,
                vec![split(a, 30.0), split(b, 30.0), split(c, 30.0)],
            ))
            .unwrap();
        assert_eq!(group.debt_between(b, a).unwrap(), 30.0);
        assert_eq!(group.debt_between(c, a).unwrap(), 30.0);
        assert_eq!(group.debt_between(a, b).unwrap(), 0.0);

        assert_eq!(
            group.settle(b, a).unwrap(),
            Some(Debt {
                debtor: b,
                creditor: a,
                amount: 30.0,
            })
        );
        assert_eq!(group.debt_between(b, a).unwrap(), 0.0);
        assert_eq!(group.settle(b, a).unwrap(), None);

        assert_eq!(
            group.remove_member(c),
            Err(EngineError::UnsettledDebt {
                participant: c,
                counterparty: a,
                amount: 30.0,
            })
        );
        assert_eq!(group.len(), 3);

        group.settle(c, a).unwrap();
        group.remove_member(c).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.members(), vec![a, b]);
        assert_eq!(group.debt_between(b, a).unwrap(), 0.0);
        assert_eq!(
            group.debt_between(c, a),
            Err(EngineError::UnknownParticipant(c))
        );
    }

    #[test]
    fn settle_reports_the_direction_actually_cleared() {
        let (mut group, ids) = group(2);
        let [a, b] = [ids[0], ids[1]];
        group
            .add_expense(Expense::new(a, 12.0, vec![split(b, 12.0)]))
            .unwrap();

        // Named the wrong way round: b owed a.
        assert_eq!(
            group.settle(a, b).unwrap(),
            Some(Debt {
                debtor: b,
                creditor: a,
                amount: 12.0,
            })
        );
        assert!(group.all_debts().unwrap().is_empty());
    }

    #[test]
    fn removing_a_middle_member_keeps_other_balances() {
        let (mut group, ids) = group(4);
        group
            .add_expense(Expense::new(ids[3], 20.0, vec![split(ids[0], 20.0)]))
            .unwrap();
        group
            .add_expense(Expense::new(ids[2], 8.0, vec![split(ids[3], 8.0)]))
            .unwrap();

        group.remove_member(ids[1]).unwrap();

        assert_eq!(group.members(), vec![ids[0], ids[2], ids[3]]);
        assert_eq!(group.debt_between(ids[0], ids[3]).unwrap(), 20.0);
        assert_eq!(group.debt_between(ids[3], ids[2]).unwrap(), 8.0);
        assert_eq!(group.total_owed_to(ids[3]).unwrap(), 20.0);
        assert_eq!(group.total_owed_by(ids[3]).unwrap(), 8.0);
        assert_eq!(group.net_balance(ids[3]).unwrap(), 12.0);
    }

    #[test]
    fn failed_update_keeps_ledger() {
        let (mut group, ids) = group(2);
        let old = group
            .add_expense(Expense::new(ids[0], 10.0, vec![split(ids[1], 10.0)]))
            .unwrap();
        let before = group.clone();

        let bad = Expense::new(ids[0], 10.0, vec![split(ids[1], 3.0)]);
        assert!(group.update_expense(&old, bad).is_err());
        assert_eq!(group, before);

        let good = Expense::new(ids[1], 4.0, vec![split(ids[0], 4.0)]);
        group.update_expense(&old, good).unwrap();
        assert_eq!(group.debt_between(ids[0], ids[1]).unwrap(), 4.0);
        assert_eq!(group.debt_between(ids[1], ids[0]).unwrap(), 0.0);
    }

    #[test]
    fn delete_expense_reverts() {
        let (mut group, ids) = group(3);
        let expense = group
            .add_expense(Expense::even(ids[0], 30.0, &ids).unwrap())
            .unwrap();
        assert_eq!(group.all_debts().unwrap().len(), 2);

        group.delete_expense(&expense).unwrap();
        assert!(group.all_debts().unwrap().is_empty());
    }

    #[test]
    fn all_debts_names_participants() {
        let (mut group, ids) = group(3);
        group
            .add_expense(Expense::new(ids[1], 15.0, vec![split(ids[2], 15.0)]))
            .unwrap();
        assert_eq!(
            group.all_debts().unwrap(),
            vec![Debt {
                debtor: ids[2],
                creditor: ids[1],
                amount: 15.0,
            }]
        );
    }

    #[test]
    fn state_round_trips_through_json() {
        let (mut group, ids) = group(3);
        group
            .add_expense(Expense::new(ids[0], 9.0, vec![split(ids[2], 9.0)]))
            .unwrap();

        let json = serde_json::to_string(&group.state()).unwrap();
        let restored = GroupLedger::from_state(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored, group);
        assert_eq!(restored.debt_between(ids[2], ids[0]).unwrap(), 9.0);
    }

    #[test]
    fn from_members_checks_cell_count() {
        let ids: Vec<_> = (0..3).map(|_| ParticipantId::new()).collect();
        assert!(GroupLedger::from_members(ids.clone(), vec![0.0; 3]).is_ok());
        assert!(matches!(
            GroupLedger::from_members(ids, vec![0.0; 2]),
            Err(EngineError::CorruptState(_))
        ));
    }

    #[test]
    fn duplicate_member_is_rejected() {
        let (mut group, ids) = group(1);
        assert_eq!(
            group.add_member(ids[0]),
            Err(EngineError::ExistingKey(ids[0].to_string()))
        );
        assert_eq!(group.len(), 1);
    }
}
