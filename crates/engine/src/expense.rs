//! Expenses and their effect on the ledger.
//!
//! An [`Expense`] is a multi-party transfer: one payer, many debtors. Applying
//! it makes every debtor owe the payer their share; the payer's own share (if
//! listed) is skipped. [`reverse`] is the exact inverse of [`apply`], which is
//! what edits and deletions are built on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    DebtLedger, EngineError, IndexMap, ParticipantId, ResultEngine,
    amount::{ensure_non_negative, nearly_equal},
};

/// The share of an expense owed by one participant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub debtor: ParticipantId,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub payer: ParticipantId,
    pub total: f64,
    pub splits: Vec<Split>,
    pub description: Option<String>,
}

impl Expense {
    pub fn new(payer: ParticipantId, total: f64, splits: Vec<Split>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payer,
            total,
            splits,
            description: None,
        }
    }

    /// Splits `total` evenly among `debtors`, giving the rounding remainder
    /// (in cents) to the first ones.
    pub fn even(
        payer: ParticipantId,
        total: f64,
        debtors: &[ParticipantId],
    ) -> ResultEngine<Self> {
        ensure_non_negative(total, "expense total")?;
        if debtors.is_empty() {
            return Err(EngineError::InvalidAmount(
                "an expense needs at least one debtor".to_string(),
            ));
        }
        let total_cents = (total * 100.0).round() as i64;
        let count = debtors.len() as i64;
        let base = total_cents / count;
        let remainder = total_cents % count;
        let splits = debtors
            .iter()
            .enumerate()
            .map(|(i, debtor)| {
                let cents = base + i64::from((i as i64) < remainder);
                Split {
                    debtor: *debtor,
                    amount: cents as f64 / 100.0,
                }
            })
            .collect();
        Ok(Self::new(payer, total, splits))
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sum of all the splits, payer's share included.
    pub fn split_sum(&self) -> f64 {
        self.splits.iter().map(|s| s.amount).sum()
    }

    /// Every participant the expense touches.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        std::iter::once(self.payer).chain(self.splits.iter().map(|s| s.debtor))
    }
}

/// A validated `(debtor_slot, payer_slot, amount)` move.
type SlotTransfer = (usize, usize, f64);

/// Validates the expense against the group and resolves it to slot transfers.
/// Nothing is mutated, so a failure here rejects the whole expense.
fn resolve(
    ledger: &DebtLedger,
    index_map: &IndexMap,
    expense: &Expense,
) -> ResultEngine<Vec<SlotTransfer>> {
    ensure_non_negative(expense.total, "expense total")?;
    if expense.total == 0.0 {
        return Err(EngineError::InvalidAmount(
            "expense total must be > 0".to_string(),
        ));
    }
    for split in &expense.splits {
        ensure_non_negative(split.amount, "split amount")?;
    }

    let actual = expense.split_sum();
    if !nearly_equal(actual, expense.total) {
        return Err(EngineError::SplitMismatch {
            expected: expense.total,
            actual,
        });
    }

    let payer = index_map.slot_of(expense.payer)?;
    let mut transfers = Vec::with_capacity(expense.splits.len());
    for split in &expense.splits {
        let debtor = index_map.slot_of(split.debtor)?;
        if debtor == payer {
            continue;
        }
        // Surface slot/ledger drift before the first write.
        ledger.cell_index(debtor, payer)?;
        transfers.push((debtor, payer, split.amount));
    }
    Ok(transfers)
}

fn record_all(
    ledger: &mut DebtLedger,
    transfers: &[SlotTransfer],
    sign: f64,
) -> ResultEngine<()> {
    for (debtor, payer, amount) in transfers {
        ledger.record_transfer(*debtor, *payer, sign * amount)?;
    }
    Ok(())
}

/// Adds the expense's debts to the ledger.
pub fn apply(
    ledger: &mut DebtLedger,
    index_map: &IndexMap,
    expense: &Expense,
) -> ResultEngine<()> {
    let transfers = resolve(ledger, index_map, expense)?;
    record_all(ledger, &transfers, 1.0)?;
    tracing::debug!(
        expense = %expense.id,
        transfers = transfers.len(),
        "applied expense"
    );
    Ok(())
}

/// Removes the expense's debts from the ledger.
pub fn reverse(
    ledger: &mut DebtLedger,
    index_map: &IndexMap,
    expense: &Expense,
) -> ResultEngine<()> {
    let transfers = resolve(ledger, index_map, expense)?;
    record_all(ledger, &transfers, -1.0)?;
    tracing::debug!(
        expense = %expense.id,
        transfers = transfers.len(),
        "reversed expense"
    );
    Ok(())
}

/// Replaces `old` with `new`: reverse first, then apply.
///
/// If applying `new` fails the ledger is left with `old` reversed. Callers
/// that need all-or-nothing semantics run this on a copy.
pub fn update(
    ledger: &mut DebtLedger,
    index_map: &IndexMap,
    old: &Expense,
    new: &Expense,
) -> ResultEngine<()> {
    reverse(ledger, index_map, old)?;
    apply(ledger, index_map, new)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        ledger: DebtLedger,
        index_map: IndexMap,
        members: Vec<ParticipantId>,
    }

    fn fixture(n: usize) -> Fixture {
        let members: Vec<_> = (0..n).map(|_| ParticipantId::new()).collect();
        Fixture {
            ledger: DebtLedger::new(n),
            index_map: IndexMap::from_members(members.clone()).unwrap(),
            members,
        }
    }

    fn split(debtor: ParticipantId, amount: f64) -> Split {
        Split { debtor, amount }
    }

    #[test]
    fn apply_skips_payer_share() {
        let mut f = fixture(3);
        let [a, b, c] = [f.members[0], f.members[1], f.members[2]];
        let expense = Expense::new(a, 90.0, vec![split(a, 30.0), split(b, 30.0), split(c, 30.0)]);

        apply(&mut f.ledger, &f.index_map, &expense).unwrap();

        assert_eq!(f.ledger.debt_of(1, 0).unwrap(), 30.0);
        assert_eq!(f.ledger.debt_of(2, 0).unwrap(), 30.0);
        assert_eq!(f.ledger.debt_of(0, 1).unwrap(), 0.0);
        assert_eq!(f.ledger.total_owed_by(0).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_splits_reject_everything() {
        let mut f = fixture(3);
        let [a, b, c] = [f.members[0], f.members[1], f.members[2]];
        let expense = Expense::new(a, 90.0, vec![split(b, 30.0), split(c, 30.0)]);

        let err = apply(&mut f.ledger, &f.index_map, &expense).unwrap_err();
        assert_eq!(
            err,
            EngineError::SplitMismatch {
                expected: 90.0,
                actual: 60.0
            }
        );
        assert!(f.ledger.cells().iter().all(|c| *c == 0.0));
    }

    #[test]
    fn unknown_debtor_rejects_everything() {
        let mut f = fixture(2);
        let stranger = ParticipantId::new();
        let expense = Expense::new(
            f.members[0],
            20.0,
            vec![split(f.members[1], 10.0), split(stranger, 10.0)],
        );

        assert_eq!(
            apply(&mut f.ledger, &f.index_map, &expense),
            Err(EngineError::UnknownParticipant(stranger))
        );
        assert_eq!(f.ledger.debt_of(1, 0).unwrap(), 0.0);
    }

    #[test]
    fn negative_split_is_invalid() {
        let mut f = fixture(2);
        let expense = Expense::new(
            f.members[0],
            10.0,
            vec![split(f.members[1], 20.0), split(f.members[0], -10.0)],
        );
        assert!(matches!(
            apply(&mut f.ledger, &f.index_map, &expense),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn reverse_restores_previous_state() {
        let mut f = fixture(4);
        let m = f.members.clone();
        let before = Expense::new(m[2], 40.0, vec![split(m[0], 25.0), split(m[3], 15.0)]);
        apply(&mut f.ledger, &f.index_map, &before).unwrap();
        let snapshot = f.ledger.clone();

        let expense = Expense::new(
            m[0],
            100.0,
            vec![split(m[1], 33.33), split(m[2], 33.33), split(m[3], 33.34)],
        );
        apply(&mut f.ledger, &f.index_map, &expense).unwrap();
        reverse(&mut f.ledger, &f.index_map, &expense).unwrap();

        for (got, want) in f.ledger.cells().iter().zip(snapshot.cells()) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn apply_nets_against_existing_balance() {
        let mut f = fixture(2);
        let [a, b] = [f.members[0], f.members[1]];
        apply(
            &mut f.ledger,
            &f.index_map,
            &Expense::new(b, 10.0, vec![split(a, 10.0)]),
        )
        .unwrap();
        assert_eq!(f.ledger.total_owed_by(0).unwrap(), 10.0);

        apply(
            &mut f.ledger,
            &f.index_map,
            &Expense::new(a, 30.0, vec![split(b, 30.0)]),
        )
        .unwrap();
        // a's 10 is offset, b now owes 20
        assert_eq!(f.ledger.total_owed_by(0).unwrap(), 0.0);
        assert_eq!(f.ledger.total_owed_by(1).unwrap(), 20.0);
    }

    #[test]
    fn update_swaps_expenses() {
        let mut f = fixture(3);
        let m = f.members.clone();
        let old = Expense::new(m[0], 60.0, vec![split(m[1], 30.0), split(m[2], 30.0)]);
        apply(&mut f.ledger, &f.index_map, &old).unwrap();

        let mut new = Expense::new(m[0], 50.0, vec![split(m[1], 50.0)]);
        new.id = old.id;
        update(&mut f.ledger, &f.index_map, &old, &new).unwrap();

        assert_eq!(f.ledger.debt_of(1, 0).unwrap(), 50.0);
        assert_eq!(f.ledger.debt_of(2, 0).unwrap(), 0.0);
    }

    #[test]
    fn failed_update_leaves_old_reversed() {
        let mut f = fixture(2);
        let m = f.members.clone();
        let old = Expense::new(m[0], 20.0, vec![split(m[1], 20.0)]);
        apply(&mut f.ledger, &f.index_map, &old).unwrap();

        let bad = Expense::new(m[0], 20.0, vec![split(m[1], 5.0)]);
        assert!(update(&mut f.ledger, &f.index_map, &old, &bad).is_err());
        assert_eq!(f.ledger.debt_of(1, 0).unwrap(), 0.0);
    }

    #[test]
    fn even_split_distributes_remainder() {
        let m: Vec<_> = (0..3).map(|_| ParticipantId::new()).collect();
        let expense = Expense::even(m[0], 100.0, &m).unwrap();
        let amounts: Vec<f64> = expense.splits.iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![33.34, 33.33, 33.33]);
        assert!(nearly_equal(expense.split_sum(), 100.0));
    }
}
