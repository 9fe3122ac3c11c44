use thiserror::Error;

use obdagate_catalog::SchemaUnavailable;
use obdagate_mapping::MappingParseError;
use obdagate_storage::StorageError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("template: {0}")]
    Template(#[from] MappingParseError),
    #[error(transparent)]
    Schema(#[from] SchemaUnavailable),
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Schema(#[from] SchemaUnavailable),
    #[error("selection names unknown mapping block `{0}`")]
    UnknownBlock(String),
    #[error("block `{block}`: table `{table}` not found in schema")]
    UnknownTable { block: String, table: String },
    #[error("block `{block}`: placeholder index {index} out of range ({len} placeholders)")]
    PlaceholderOutOfRange {
        block: String,
        index: usize,
        len: usize,
    },
    #[error("block `{block}`: column index {index} out of range ({len} columns in `{table}`)")]
    ColumnOutOfRange {
        block: String,
        table: String,
        index: usize,
        len: usize,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
