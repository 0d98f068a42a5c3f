//! Shared-household debt ledger.
//!
//! The core is [`GroupLedger`]: for every pair of members of a group it keeps
//! the net amount one owes the other, and keeps it consistent as expenses are
//! added, edited or deleted, as pairs settle up, and as members join or leave.
//!
//! [`Engine`] wraps it with persistence: every operation loads a group's
//! ledger from the database, runs one [`GroupLedger`] operation and stores the
//! result in the same database transaction.

pub use debts::{DebtLedger, SlotDebt};
pub use error::EngineError;
pub use expense::{Expense, Split};
pub use group::{Debt, GroupLedger, GroupState};
pub use index_map::IndexMap;
pub use members::Member;
pub use ops::{AddExpenseCmd, Engine, EngineBuilder, GroupSnapshot, MemberTotals, UpdateExpenseCmd};
pub use participant::ParticipantId;

pub mod amount;
mod debts;
mod error;
pub mod expense;
mod expenses;
mod group;
mod groups;
mod index_map;
mod members;
mod ops;
mod participant;
pub mod resize;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
