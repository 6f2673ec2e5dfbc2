use std::collections::HashMap;

use crate::errors::ParserError;

/// One line of delimited text, split into trimmed cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularRow {
    cells: Vec<String>,
}

impl TabularRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// True for rows produced by blank lines (or rows whose leading cell is empty).
    pub fn first_cell_is_empty(&self) -> bool {
        self.cells.first().is_none_or(|cell| cell.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(String::is_empty)
    }
}

impl<S: Into<String>> FromIterator<S> for TabularRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Splits `text` into one row per `\n`-terminated line. Never fails and never
/// returns an empty vector: empty input is a single row holding one empty cell.
pub fn parse_table(text: &str, delimiter: char) -> Vec<TabularRow> {
    text.split('\n')
        .map(|line| line.split(delimiter).map(str::trim).collect())
        .collect()
}

/// A table split at its header: the first non-blank row.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSplit<'a> {
    pub table: &'static str,
    pub header: &'a TabularRow,
    /// 1-based line number of the header.
    pub header_line: usize,
    pub body: &'a [TabularRow],
}

impl<'a> HeaderSplit<'a> {
    pub fn locate(table: &'static str, rows: &'a [TabularRow]) -> Result<Self, ParserError> {
        let position = rows
            .iter()
            .position(|row| !row.is_blank())
            .ok_or(ParserError::MissingHeader { table })?;
        Ok(Self {
            table,
            header: &rows[position],
            header_line: position + 1,
            body: &rows[position + 1..],
        })
    }

    /// 1-based line number of the `offset`-th body row.
    pub fn line_number(&self, offset: usize) -> usize {
        self.header_line + offset + 1
    }

    pub fn index(&self) -> ColumnIndex {
        ColumnIndex::from_header(self.table, self.header)
    }
}

/// A resolved header column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub index: usize,
}

/// Column name to cell position, built from a header row.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    table: &'static str,
    width: usize,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Repeated header names keep their first position.
    pub fn from_header(table: &'static str, header: &TabularRow) -> Self {
        let mut positions = HashMap::with_capacity(header.len());
        for (index, name) in header.cells().iter().enumerate() {
            positions.entry(name.trim().to_string()).or_insert(index);
        }
        Self {
            table,
            width: header.len(),
            positions,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Number of header cells. Data rows need at least this many.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of distinct column names in the header.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<Column, ParserError> {
        self.get(name)
            .map(|index| Column {
                name: name.to_string(),
                index,
            })
            .ok_or_else(|| ParserError::MissingColumn {
                table: self.table,
                column: name.to_string(),
            })
    }
}

/// A data row together with where it came from, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    pub table: &'static str,
    pub line_number: usize,
    pub row: &'a TabularRow,
}

impl<'a> RowRef<'a> {
    pub fn new(table: &'static str, line_number: usize, row: &'a TabularRow) -> Self {
        Self {
            table,
            line_number,
            row,
        }
    }

    pub fn text(&self, column: &Column) -> Result<&'a str, ParserError> {
        self.row
            .get(column.index)
            .ok_or_else(|| ParserError::MissingCell {
                table: self.table,
                line_number: self.line_number,
                column: column.name.clone(),
                width: self.row.len(),
            })
    }

    pub fn number(&self, column: &Column) -> Result<f64, ParserError> {
        let value = self.text(column)?;
        value
            .parse::<f64>()
            .map_err(|_| ParserError::InvalidNumber {
                table: self.table,
                line_number: self.line_number,
                column: column.name.clone(),
                value: value.to_string(),
            })
    }
}
