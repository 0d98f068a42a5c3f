//! The module contains the errors the engine can throw.
//!
//! The ledger errors are:
//!
//! - [`UnknownParticipant`] thrown when a participant has no slot in the group.
//! - [`SplitMismatch`] thrown when the splits of an expense don't add up to its
//!   total.
//! - [`UnsettledDebt`] thrown when removing a participant that still owes or is
//!   owed money.
//! - [`IndexOutOfRange`] thrown when the slot bookkeeping and the ledger
//!   disagree. The group must be reloaded from storage.
//!
//!  [`UnknownParticipant`]: EngineError::UnknownParticipant
//!  [`SplitMismatch`]: EngineError::SplitMismatch
//!  [`UnsettledDebt`]: EngineError::UnsettledDebt
//!  [`IndexOutOfRange`]: EngineError::IndexOutOfRange
use sea_orm::DbErr;
use thiserror::Error;

use crate::ParticipantId;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),
    #[error("Splits sum to {actual:.2}, expected {expected:.2}")]
    SplitMismatch { expected: f64, actual: f64 },
    #[error("{participant} has an unsettled balance of {amount:.2} with {counterparty}")]
    UnsettledDebt {
        participant: ParticipantId,
        counterparty: ParticipantId,
        amount: f64,
    },
    #[error("Slot pair ({a}, {b}) out of range for {size} participants")]
    IndexOutOfRange { a: usize, b: usize, size: usize },
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Corrupt group state: {0}")]
    CorruptState(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UnknownParticipant(a), Self::UnknownParticipant(b)) => a == b,
            (
                Self::SplitMismatch {
                    expected: e1,
                    actual: a1,
                },
                Self::SplitMismatch {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (
                Self::UnsettledDebt {
                    participant: p1,
                    counterparty: c1,
                    amount: a1,
                },
                Self::UnsettledDebt {
                    participant: p2,
                    counterparty: c2,
                    amount: a2,
                },
            ) => p1 == p2 && c1 == c2 && a1 == a2,
            (
                Self::IndexOutOfRange {
                    a: a1,
                    b: b1,
                    size: s1,
                },
                Self::IndexOutOfRange {
                    a: a2,
                    b: b2,
                    size: s2,
                },
            ) => a1 == a2 && b1 == b2 && s1 == s2,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::CorruptState(a), Self::CorruptState(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptState(err.to_string())
    }
}
