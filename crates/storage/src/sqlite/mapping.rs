use sqlx::Row;
use study_core::model::ResponseSnapshot;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn status_from_i64(v: i64) -> Result<u16, StorageError> {
    u16::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid status: {v}")))
}

pub(crate) fn map_response_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ResponseSnapshot, StorageError> {
    let status = status_from_i64(row.try_get::<i64, _>("status").map_err(ser)?)?;
    let content_type: Option<String> = row.try_get("content_type").map_err(ser)?;
    let body: Vec<u8> = row.try_get("body").map_err(ser)?;
    Ok(ResponseSnapshot::new(status, content_type, body))
}
