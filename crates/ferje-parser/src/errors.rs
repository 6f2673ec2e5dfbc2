use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{table} table has no header row")]
    MissingHeader { table: &'static str },

    #[error("{table} header is missing required column '{column}'")]
    MissingColumn { table: &'static str, column: String },

    #[error("{table} line {line_number}: column '{column}' has no cell in a row of {width} cells")]
    MissingCell {
        table: &'static str,
        line_number: usize,
        column: String,
        width: usize,
    },

    #[error("{table} line {line_number}: failed to parse column '{column}' value '{value}' as number")]
    InvalidNumber {
        table: &'static str,
        line_number: usize,
        column: String,
        value: String,
    },
}
