//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! parsing of stored values so every load path fails the same way.

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::CorruptState(format!("invalid {label} id")))
}

/// Decode a JSON column.
pub(crate) fn parse_json<T: DeserializeOwned>(value: &str, label: &str) -> ResultEngine<T> {
    serde_json::from_str(value)
        .map_err(|err| EngineError::CorruptState(format!("invalid {label}: {err}")))
}

/// Trim a user supplied name and reject empty ones.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
