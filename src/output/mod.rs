//! Output formatting for CLI results

use adminop::Result;

use crate::cli::OutputFormat;

pub mod json;
pub mod records;
pub mod table;

pub use records::{RecordDetail, RecordList};

/// Trait for types that can be formatted for output
pub trait Formattable {
    /// Format the data according to the specified format
    fn format(&self, format: OutputFormat) -> Result<String>;
}

/// Format and print data to stdout
pub fn print<T: Formattable>(data: &T, format: OutputFormat) -> Result<()> {
    let output = data.format(format)?;
    println!("{}", output);
    Ok(())
}
