//! Formatting for resource records

use adminop::Result;
use adminop::client::Page;
use adminop::resource::{Record, ResourceDescriptor};

use super::Formattable;
use super::json::{format_json, format_json_page};
use super::table::{TableStyle, format_detail, format_records};
use crate::cli::OutputFormat;

/// One page of a collection
pub struct RecordList<'a> {
    pub descriptor: &'a ResourceDescriptor,
    pub page: &'a Page<Record>,
}

impl Formattable for RecordList<'_> {
    fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(format_json_page(self.page)?),
            OutputFormat::Table => Ok(format_records(
                self.descriptor.columns,
                &self.page.content,
                TableStyle::Plain,
            )),
            OutputFormat::Pretty => {
                let table = format_records(self.descriptor.columns, &self.page.content, TableStyle::Rounded);
                match page_summary(self.page) {
                    Some(summary) => Ok(format!("{}\n{}", table, summary)),
                    None => Ok(table),
                }
            }
        }
    }
}

/// `Showing 11-20 of 23 (page 2 of 3)`, plus a hint when more pages follow
fn page_summary(page: &Page<Record>) -> Option<String> {
    if page.content.is_empty() {
        return None;
    }

    let first = page.offset() + 1;
    let last = page.offset() + page.content.len();
    let mut summary = format!(
        "Showing {}-{} of {} (page {} of {})",
        first,
        last,
        page.total_elements,
        page.page_index + 1,
        page.total_pages().max(1)
    );
    if page.has_next_page() {
        summary.push_str(&format!("\nUse --page {} for more", page.page_index + 1));
    }
    Some(summary)
}

/// A single entity
pub struct RecordDetail<'a> {
    pub record: &'a Record,
}

impl Formattable for RecordDetail<'_> {
    fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(format_json(self.record)?),
            OutputFormat::Table => Ok(format_detail(self.record, TableStyle::Plain)),
            OutputFormat::Pretty => Ok(format_detail(self.record, TableStyle::Rounded)),
        }
    }
}
