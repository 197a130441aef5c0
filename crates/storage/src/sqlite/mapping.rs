use sqlx::Row;
use study_core::model::{FlowchartData, HostPhase, ItemId, ParticipantId, SessionId};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Like `conn`, but reports unique-key violations as `Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn position_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn position_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn session_id_from_str(v: &str) -> Result<SessionId, StorageError> {
    v.parse().map_err(ser)
}

pub(crate) fn participant_id_from_str(v: &str) -> Result<ParticipantId, StorageError> {
    v.parse().map_err(ser)
}

pub(crate) fn item_id_from_str(v: String) -> Result<ItemId, StorageError> {
    ItemId::new(v).map_err(ser)
}

pub(crate) fn phase_to_row(phase: HostPhase) -> Result<(&'static str, Option<i64>), StorageError> {
    let index = phase
        .current_index()
        .map(|i| position_to_i64("question_index", i))
        .transpose()?;
    Ok((phase.label(), index))
}

pub(crate) fn phase_from_row(label: &str, index: Option<i64>) -> Result<HostPhase, StorageError> {
    let index = index
        .map(|i| position_from_i64("question_index", i))
        .transpose()?;
    HostPhase::from_label(label, index)
        .ok_or_else(|| StorageError::Serialization(format!("invalid phase: {label}/{index:?}")))
}

pub(crate) fn map_flowchart_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<FlowchartData, StorageError> {
    FlowchartData::new(
        item_id_from_str(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("mermaid_code").map_err(ser)?,
        row.try_get::<String, _>("content").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}
