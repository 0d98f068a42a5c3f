//! Participant <-> slot mapping.
//!
//! Participant ids are not contiguous, so every member of a group is assigned
//! a dense 0-based slot used to address the [`DebtLedger`](crate::DebtLedger).
//!
//! Outside of a resize the mapping is a bijection onto `[0, len)`. Removing a
//! participant leaves a hole that [`IndexMap::compact`] closes, which is done
//! together with the ledger rebuild.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ParticipantId, ResultEngine};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<ParticipantId, usize>",
    into = "BTreeMap<ParticipantId, usize>"
)]
pub struct IndexMap {
    slots: HashMap<ParticipantId, usize>,
    by_slot: Vec<Option<ParticipantId>>,
}

impl IndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the mapping from an ordered member list: the n-th member gets
    /// slot n.
    pub fn from_members<I>(members: I) -> ResultEngine<Self>
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        let mut map = Self::new();
        for participant in members {
            map.add(participant)?;
        }
        Ok(map)
    }

    /// Number of mapped participants.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_of(&self, participant: ParticipantId) -> ResultEngine<usize> {
        self.slots
            .get(&participant)
            .copied()
            .ok_or(EngineError::UnknownParticipant(participant))
    }

    pub fn participant_at(&self, slot: usize) -> Option<ParticipantId> {
        self.by_slot.get(slot).copied().flatten()
    }

    /// Participants in slot order.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.by_slot.iter().filter_map(|p| *p)
    }

    /// Assigns the slot after the highest one in use.
    pub fn add(&mut self, participant: ParticipantId) -> ResultEngine<usize> {
        if self.slots.contains_key(&participant) {
            return Err(EngineError::ExistingKey(participant.to_string()));
        }
        let slot = self.by_slot.len();
        self.by_slot.push(Some(participant));
        self.slots.insert(participant, slot);
        Ok(slot)
    }

    /// Drops the mapping and returns the vacated slot. Other slots keep their
    /// number until [`compact`](Self::compact) runs.
    pub fn remove(&mut self, participant: ParticipantId) -> ResultEngine<usize> {
        let slot = self
            .slots
            .remove(&participant)
            .ok_or(EngineError::UnknownParticipant(participant))?;
        self.by_slot[slot] = None;
        while matches!(self.by_slot.last(), Some(None)) {
            self.by_slot.pop();
        }
        Ok(slot)
    }

    /// Closes the holes left by [`remove`](Self::remove): every slot moves
    /// down by the number of vacated slots below it.
    pub fn compact(&mut self) {
        self.by_slot.retain(Option::is_some);
        for (slot, participant) in self.by_slot.iter().enumerate() {
            if let Some(participant) = participant {
                self.slots.insert(*participant, slot);
            }
        }
    }

    /// `true` when slots cover `[0, len)` without holes.
    pub fn is_dense(&self) -> bool {
        self.by_slot.len() == self.slots.len()
    }
}

impl From<IndexMap> for BTreeMap<ParticipantId, usize> {
    fn from(map: IndexMap) -> Self {
        map.slots.into_iter().collect()
    }
}

impl TryFrom<BTreeMap<ParticipantId, usize>> for IndexMap {
    type Error = EngineError;

    fn try_from(slots: BTreeMap<ParticipantId, usize>) -> Result<Self, Self::Error> {
        let mut by_slot = vec![None; slots.len()];
        for (participant, slot) in &slots {
            match by_slot.get_mut(*slot) {
                Some(cell @ None) => *cell = Some(*participant),
                Some(Some(_)) => {
                    return Err(EngineError::CorruptState(format!(
                        "slot {slot} assigned twice"
                    )));
                }
                None => {
                    return Err(EngineError::CorruptState(format!(
                        "slot {slot} out of range for {} participants",
                        slots.len()
                    )));
                }
            }
        }
        Ok(Self {
            slots: slots.into_iter().collect(),
            by_slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ParticipantId> {
        (0..n).map(|_| ParticipantId::new()).collect()
    }

    #[test]
    fn from_members_follows_list_order() {
        let members = ids(3);
        let map = IndexMap::from_members(members.clone()).unwrap();
        assert_eq!(map.len(), 3);
        for (slot, participant) in members.iter().enumerate() {
            assert_eq!(map.slot_of(*participant).unwrap(), slot);
            assert_eq!(map.participant_at(slot), Some(*participant));
        }
        assert_eq!(map.participants().collect::<Vec<_>>(), members);
    }

    #[test]
    fn unknown_participant_is_reported() {
        let map = IndexMap::new();
        let missing = ParticipantId::new();
        assert_eq!(
            map.slot_of(missing),
            Err(EngineError::UnknownParticipant(missing))
        );
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut map = IndexMap::new();
        let p = ParticipantId::new();
        map.add(p).unwrap();
        assert_eq!(map.add(p), Err(EngineError::ExistingKey(p.to_string())));
    }

    #[test]
    fn remove_leaves_hole_until_compacted() {
        let members = ids(4);
        let mut map = IndexMap::from_members(members.clone()).unwrap();

        assert_eq!(map.remove(members[1]).unwrap(), 1);
        assert!(!map.is_dense());
        assert_eq!(map.slot_of(members[3]).unwrap(), 3);
        assert_eq!(map.participant_at(1), None);

        map.compact();
        assert!(map.is_dense());
        assert_eq!(map.slot_of(members[0]).unwrap(), 0);
        assert_eq!(map.slot_of(members[2]).unwrap(), 1);
        assert_eq!(map.slot_of(members[3]).unwrap(), 2);
    }

    #[test]
    fn add_uses_next_slot_after_highest() {
        let members = ids(3);
        let mut map = IndexMap::from_members(members.clone()).unwrap();
        map.remove(members[0]).unwrap();

        let newcomer = ParticipantId::new();
        assert_eq!(map.add(newcomer).unwrap(), 3);

        // Removing the highest slot frees it for the next add.
        map.remove(newcomer).unwrap();
        assert_eq!(map.add(ParticipantId::new()).unwrap(), 3);
    }

    #[test]
    fn serde_round_trips_and_rejects_gaps() {
        let members = ids(3);
        let map = IndexMap::from_members(members).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        let decoded: IndexMap = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, map);

        let p = ParticipantId::new();
        let gap = format!("{{\"{p}\": 1}}");
        assert!(serde_json::from_str::<IndexMap>(&gap).is_err());
    }

    #[test]
    fn stored_slots_are_validated() {
        let members = ids(2);
        let shared: BTreeMap<_, _> = members.iter().map(|p| (*p, 0)).collect();
        assert!(matches!(
            IndexMap::try_from(shared),
            Err(EngineError::CorruptState(_))
        ));

        let dense: BTreeMap<_, _> = members.iter().copied().zip([1, 0]).collect();
        let map = IndexMap::try_from(dense).unwrap();
        assert_eq!(map.participant_at(0), Some(members[1]));
        assert_eq!(map.participant_at(1), Some(members[0]));
    }
}
