//! Table error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TableError>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table {table_id} is missing {field}")]
    MissingContent { table_id: String, field: &'static str },

    #[error("Table {0} has no usable columns")]
    NoColumns(String),
}
