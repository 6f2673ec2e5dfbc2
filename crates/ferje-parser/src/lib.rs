pub mod errors;
pub mod table;

pub use errors::ParserError;
pub use table::{parse_table, Column, ColumnIndex, HeaderSplit, RowRef, TabularRow};
