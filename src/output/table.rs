//! Table output formatting
//!
//! Records are schemaless JSON objects, so tables are built row by row from
//! the descriptor's column list rather than derived from a struct.

use serde_json::Value;
use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Rows},
};

use adminop::resource::{Record, value_to_text};

const EMPTY_CELL: &str = "-";

/// Table border style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    /// Rounded borders with a centred header
    Rounded,
    /// No borders, whitespace separated
    Plain,
}

/// Format records as a table with one column per entry in `columns`
pub fn format_records(columns: &[&str], rows: &[Record], style: TableStyle) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    let mut builder = Builder::new();
    builder.push_record(columns.iter().map(|c| header(c)));
    for row in rows {
        builder.push_record(columns.iter().map(|c| cell(row.get(*c))));
    }

    finish(builder.build(), style)
}

/// Format one record as a two-column FIELD/VALUE table
pub fn format_detail(record: &Record, style: TableStyle) -> String {
    if record.is_empty() {
        return "No results found.".to_string();
    }

    let mut builder = Builder::new();
    builder.push_record(["FIELD", "VALUE"]);
    for (field, value) in record {
        builder.push_record([field.clone(), cell(Some(value))]);
    }

    finish(builder.build(), style)
}

fn finish(mut table: Table, style: TableStyle) -> String {
    match style {
        TableStyle::Rounded => {
            table
                .with(Style::rounded())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
        }
        TableStyle::Plain => {
            table.with(Style::blank());
        }
    }
    table.to_string()
}

/// `firstName` -> `FIRST NAME`
fn header(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, ch) in field.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push(' ');
        }
        if ch == '_' || ch == '-' {
            out.push(' ');
        } else {
            out.extend(ch.to_uppercase());
        }
    }
    out
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_CELL.to_string(),
        Some(v) => value_to_text(v).unwrap_or_else(|| v.to_string()),
    }
}
