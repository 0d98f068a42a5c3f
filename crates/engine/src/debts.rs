//! The pairwise net-balance store.
//!
//! A group of `N` participants has `N*(N-1)/2` unordered pairs. Each pair
//! `{a, b}` with `a < b` owns exactly one signed cell:
//!
//! - `cell > 0`: slot `a` owes slot `b`
//! - `cell < 0`: slot `b` owes slot `a`
//! - `cell == 0`: nothing outstanding
//!
//! Every change goes through [`DebtLedger::record_transfer`], which adds into
//! that single cell, so a pair never carries gross amounts in both directions.

use crate::{EngineError, ResultEngine, amount::EPSILON};

/// Debts below this are floating-point residue and are not reported.
const DUST: f64 = EPSILON / 2.0;

/// One directed outstanding balance between two slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotDebt {
    pub debtor: usize,
    pub creditor: usize,
    pub amount: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebtLedger {
    size: usize,
    cells: Vec<f64>,
}

/// Number of cells needed for `size` participants.
pub(crate) const fn pair_count(size: usize) -> usize {
    size * size.saturating_sub(1) / 2
}

impl DebtLedger {
    /// An all-zero ledger for `size` participants.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![0.0; pair_count(size)],
        }
    }

    /// Rebuilds a ledger from its persisted cells.
    pub fn from_cells(size: usize, cells: Vec<f64>) -> ResultEngine<Self> {
        if cells.len() != pair_count(size) {
            return Err(EngineError::CorruptState(format!(
                "ledger has {} cells, expected {} for {size} participants",
                cells.len(),
                pair_count(size)
            )));
        }
        if cells.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::CorruptState(
                "ledger contains a non-finite balance".to_string(),
            ));
        }
        Ok(Self { size, cells })
    }

    /// Number of participants the ledger is sized for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells in canonical index order.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Flat index of the pair `{a, b}` (order of the arguments is irrelevant).
    pub fn cell_index(&self, a: usize, b: usize) -> ResultEngine<usize> {
        if a == b || a >= self.size || b >= self.size {
            return Err(EngineError::IndexOutOfRange {
                a,
                b,
                size: self.size,
            });
        }
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Ok(a * (self.size - 1) + (b - 1) - a * (a + 1) / 2)
    }

    /// Raw signed value of the pair, in canonical orientation.
    pub(crate) fn cell(&self, a: usize, b: usize) -> ResultEngine<f64> {
        Ok(self.cells[self.cell_index(a, b)?])
    }

    pub(crate) fn set_cell(&mut self, a: usize, b: usize, value: f64) -> ResultEngine<()> {
        let idx = self.cell_index(a, b)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// After this call `debtor` owes `creditor` `amount` more. A negative
    /// amount moves the balance the other way.
    pub fn record_transfer(
        &mut self,
        debtor: usize,
        creditor: usize,
        amount: f64,
    ) -> ResultEngine<()> {
        let idx = self.cell_index(debtor, creditor)?;
        if debtor < creditor {
            self.cells[idx] += amount;
        } else {
            self.cells[idx] -= amount;
        }
        Ok(())
    }

    /// How much `debtor` currently owes `creditor`; `0` if nothing, if the
    /// balance flows the other way, or if it is below half a cent.
    pub fn debt_of(&self, debtor: usize, creditor: usize) -> ResultEngine<f64> {
        let cell = self.cell(debtor, creditor)?;
        let owed = if debtor < creditor { cell } else { -cell };
        Ok(if owed > DUST { owed } else { 0.0 })
    }

    /// Clears the balance of a pair.
    pub fn settle_pair(&mut self, a: usize, b: usize) -> ResultEngine<()> {
        self.set_cell(a, b, 0.0)
    }

    fn ensure_slot(&self, slot: usize) -> ResultEngine<()> {
        if slot >= self.size {
            return Err(EngineError::IndexOutOfRange {
                a: slot,
                b: slot,
                size: self.size,
            });
        }
        Ok(())
    }

    fn others(&self, slot: usize) -> impl Iterator<Item = usize> {
        (0..self.size).filter(move |other| *other != slot)
    }

    pub fn total_owed_by(&self, slot: usize) -> ResultEngine<f64> {
        self.ensure_slot(slot)?;
        self.others(slot)
            .map(|other| self.debt_of(slot, other))
            .sum()
    }

    pub fn total_owed_to(&self, slot: usize) -> ResultEngine<f64> {
        self.ensure_slot(slot)?;
        self.others(slot)
            .map(|other| self.debt_of(other, slot))
            .sum()
    }

    /// Positive when the group owes `slot` money overall.
    pub fn net_balance(&self, slot: usize) -> ResultEngine<f64> {
        Ok(self.total_owed_to(slot)? - self.total_owed_by(slot)?)
    }

    /// First pair involving `slot` whose balance exceeds the tolerance, as
    /// `(counterparty, signed amount)`; positive means `slot` is the debtor.
    pub(crate) fn first_open_balance(&self, slot: usize) -> ResultEngine<Option<(usize, f64)>> {
        self.ensure_slot(slot)?;
        for other in self.others(slot) {
            let owed = self.debt_of(slot, other)? - self.debt_of(other, slot)?;
            if owed.abs() > EPSILON {
                return Ok(Some((other, owed)));
            }
        }
        Ok(None)
    }

    /// Every ordered pair for which [`debt_of`](Self::debt_of) is positive,
    /// debtor first.
    pub fn all_nonzero_debts(&self) -> Vec<SlotDebt> {
        let mut debts = Vec::new();
        for a in 0..self.size {
            for b in (a + 1)..self.size {
                let cell = self.cells[self.pair_index_unchecked(a, b)];
                if cell > DUST {
                    debts.push(SlotDebt {
                        debtor: a,
                        creditor: b,
                        amount: cell,
                    });
                } else if cell < -DUST {
                    debts.push(SlotDebt {
                        debtor: b,
                        creditor: a,
                        amount: -cell,
                    });
                }
            }
        }
        debts
    }

    fn pair_index_unchecked(&self, a: usize, b: usize) -> usize {
        a * (self.size - 1) + (b - 1) - a * (a + 1) / 2
    }
}
