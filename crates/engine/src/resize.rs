//! Ledger resizing on membership changes.
//!
//! The flat cell index depends on the participant count, so growing or
//! shrinking rebuilds the whole array: every surviving pair is copied into its
//! recomputed index in a fresh buffer.

use crate::{DebtLedger, EngineError, IndexMap, ResultEngine};

/// Returns a ledger sized for `new_size` participants. Existing pairs keep
/// their balance, pairs touching the new slots start at zero.
pub fn grow(ledger: &DebtLedger, new_size: usize) -> ResultEngine<DebtLedger> {
    let old_size = ledger.size();
    if new_size < old_size {
        return Err(EngineError::IndexOutOfRange {
            a: new_size,
            b: old_size,
            size: old_size,
        });
    }
    let mut grown = DebtLedger::new(new_size);
    for a in 0..old_size {
        for b in (a + 1)..old_size {
            grown.set_cell(a, b, ledger.cell(a, b)?)?;
        }
    }
    Ok(grown)
}

/// Fails with `UnsettledDebt` if any removed slot still has a balance with
/// anyone else.
pub fn ensure_settled(
    ledger: &DebtLedger,
    index_map: &IndexMap,
    removed_slots: &[usize],
) -> ResultEngine<()> {
    for &slot in removed_slots {
        if let Some((other, owed)) = ledger.first_open_balance(slot)? {
            let name = |s: usize| {
                index_map
                    .participant_at(s)
                    .ok_or(EngineError::IndexOutOfRange {
                        a: slot,
                        b: other,
                        size: ledger.size(),
                    })
            };
            return Err(EngineError::UnsettledDebt {
                participant: name(slot)?,
                counterparty: name(other)?,
                amount: owed,
            });
        }
    }
    Ok(())
}

/// Returns a ledger without `removed_slots`. Surviving slots are renumbered by
/// subtracting the count of removed slots below them.
///
/// The settled check runs first; on failure nothing is allocated or changed.
/// `index_map` must still hold the removed participants so errors can name
/// them.
pub fn shrink(
    ledger: &DebtLedger,
    index_map: &IndexMap,
    removed_slots: &[usize],
) -> ResultEngine<DebtLedger> {
    let old_size = ledger.size();
    let mut removed = removed_slots.to_vec();
    removed.sort_unstable();
    removed.dedup();
    if let Some(&slot) = removed.last()
        && slot >= old_size
    {
        return Err(EngineError::IndexOutOfRange {
            a: slot,
            b: slot,
            size: old_size,
        });
    }

    ensure_settled(ledger, index_map, &removed)?;

    // old slot -> new slot, None for removed ones
    let renumbered: Vec<Option<usize>> = (0..old_size)
        .map(|slot| match removed.binary_search(&slot) {
            Ok(_) => None,
            Err(below) => Some(slot - below),
        })
        .collect();

    let mut shrunk = DebtLedger::new(old_size - removed.len());
    for a in 0..old_size {
        let Some(new_a) = renumbered[a] else {
            continue;
        };
        for b in (a + 1)..old_size {
            let Some(new_b) = renumbered[b] else {
                continue;
            };
            shrunk.set_cell(new_a, new_b, ledger.cell(a, b)?)?;
        }
    }
    Ok(shrunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParticipantId;

    fn members(n: usize) -> (Vec<ParticipantId>, IndexMap) {
        let ids: Vec<_> = (0..n).map(|_| ParticipantId::new()).collect();
        let map = IndexMap::from_members(ids.clone()).unwrap();
        (ids, map)
    }

    #[test]
    fn grow_preserves_every_pair() {
        let mut ledger = DebtLedger::new(3);
        ledger.record_transfer(1, 0, 30.0).unwrap();
        ledger.record_transfer(0, 2, 7.5).unwrap();
        ledger.record_transfer(2, 1, 4.0).unwrap();

        let grown = grow(&ledger, 5).unwrap();
        assert_eq!(grown.size(), 5);
        for a in 0..3 {
            for b in 0..3 {
                if a != b {
                    assert_eq!(grown.debt_of(a, b).unwrap(), ledger.debt_of(a, b).unwrap());
                }
            }
        }
        for other in 0..5 {
            if other != 4 {
                assert_eq!(grown.debt_of(4, other).unwrap(), 0.0);
                assert_eq!(grown.debt_of(other, 4).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn grow_from_empty() {
        let grown = grow(&DebtLedger::new(0), 1).unwrap();
        assert_eq!(grown.size(), 1);
        let grown = grow(&grown, 2).unwrap();
        assert_eq!(grown.cells(), &[0.0]);
    }

    #[test]
    fn shrink_rejects_unsettled_participant() {
        let (ids, map) = members(3);
        let mut ledger = DebtLedger::new(3);
        ledger.record_transfer(2, 0, 30.0).unwrap();
        let before = ledger.clone();

        let err = shrink(&ledger, &map, &[2]).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnsettledDebt {
                participant: ids[2],
                counterparty: ids[0],
                amount: 30.0,
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn shrink_reports_credits_too() {
        let (ids, map) = members(2);
        let mut ledger = DebtLedger::new(2);
        ledger.record_transfer(1, 0, 12.0).unwrap();

        assert_eq!(
            shrink(&ledger, &map, &[0]),
            Err(EngineError::UnsettledDebt {
                participant: ids[0],
                counterparty: ids[1],
                amount: -12.0,
            })
        );
    }

    #[test]
    fn shrink_renumbers_surviving_slots() {
        let (_, map) = members(5);
        let mut ledger = DebtLedger::new(5);
        ledger.record_transfer(0, 2, 1.0).unwrap();
        ledger.record_transfer(4, 2, 2.0).unwrap();
        ledger.record_transfer(3, 0, 3.0).unwrap();

        let shrunk = shrink(&ledger, &map, &[3, 1]).unwrap_err();
        assert!(matches!(shrunk, EngineError::UnsettledDebt { .. }));

        ledger.settle_pair(3, 0).unwrap();
        let shrunk = shrink(&ledger, &map, &[1, 3]).unwrap();
        // old 0,2,4 -> new 0,1,2
        assert_eq!(shrunk.size(), 3);
        assert_eq!(shrunk.debt_of(0, 1).unwrap(), 1.0);
        assert_eq!(shrunk.debt_of(2, 1).unwrap(), 2.0);
        assert_eq!(shrunk.debt_of(0, 2).unwrap(), 0.0);
    }

    #[test]
    fn shrink_tolerates_dust() {
        let (_, map) = members(3);
        let mut ledger = DebtLedger::new(3);
        ledger.record_transfer(1, 0, 0.004).unwrap();
        let shrunk = shrink(&ledger, &map, &[1]).unwrap();
        assert_eq!(shrunk.size(), 2);
    }

    #[test]
    fn shrink_rejects_unknown_slot() {
        let (_, map) = members(2);
        let ledger = DebtLedger::new(2);
        assert_eq!(
            shrink(&ledger, &map, &[2]),
            Err(EngineError::IndexOutOfRange { a: 2, b: 2, size: 2 })
        );
    }
}
