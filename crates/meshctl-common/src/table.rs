//! Column-aligned text tables
//!
//! Rows are built from cells (or tab-separated lines) and rendered with
//! every column padded to its widest cell plus a fixed gap. The final cell
//! of a row is written as-is, so trailing text never forces padding.

use std::io::{self, Write};

/// Gap between columns used by the status and revision tables
pub const DEFAULT_PADDING: usize = 5;

/// Buffered table that aligns columns on flush
#[derive(Clone, Debug)]
pub struct TableWriter {
    rows: Vec<Vec<String>>,
    padding: usize,
}

impl Default for TableWriter {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING)
    }
}

impl TableWriter {
    /// Create an empty table with the given column gap
    pub fn new(padding: usize) -> Self {
        Self {
            rows: Vec::new(),
            padding,
        }
    }

    /// Append a row of cells
    pub fn row<I, S>(&mut self, cells: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    /// Append a row given as tab-separated text
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.row(text.split('\t'))
    }

    /// Number of rows buffered so far
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows have been added
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render all rows to a string, one line per row
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut out = String::new();
        for row in &self.rows {
            let last = row.len().saturating_sub(1);
            for (i, cell) in row.iter().enumerate() {
                if i == last {
                    out.push_str(cell);
                } else {
                    let width = widths.get(i).copied().unwrap_or(0) + self.padding;
                    out.push_str(&format!("{:<width$}", cell, width = width));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Render and write to `w`
    pub fn flush_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(self.render().as_bytes())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for row in &self.rows {
            // the trailing cell does not take part in alignment
            for (i, cell) in row.iter().take(row.len().saturating_sub(1)).enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }
}
