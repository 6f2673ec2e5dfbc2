// crates/ferje-core/src/error.rs

use thiserror::Error;

use crate::timestamp::TimestampError;

/// Hard failures of a cleaning run. Any of these aborts the whole batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Table parsing failed: {0}")]
    Parser(#[from] ferje_parser::ParserError),

    #[error("Timestamp normalisation failed on positions line {line_number}: {source}")]
    Timestamp {
        line_number: usize,
        #[source]
        source: TimestampError,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
