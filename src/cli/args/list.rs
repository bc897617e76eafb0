//! List argument types for CLI commands

use clap::Args;
use serde::de::DeserializeOwned;

use adminop::cache::SortDirection;
use adminop::error::ValidationError;
use adminop::query::ResourceQuery;

/// Search, paging and sort arguments for `list`.
///
/// Flatten this into any command that reads a collection:
/// ```ignore
/// List {
///     #[command(flatten)]
///     list: ListArgs,
/// }
/// ```
#[derive(Args, Debug, Default, Clone)]
pub struct ListArgs {
    /// Free-text search (case-insensitive substring match)
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Page number (0-indexed)
    #[arg(long, short = 'p')]
    pub page: Option<usize>,

    /// Results per page
    #[arg(long, short = 'n')]
    pub size: Option<usize>,

    /// Field to sort by
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long, value_enum, hide_possible_values = true)]
    pub sort_dir: Option<SortDirection>,
}

impl ListArgs {
    /// Push these arguments into a query controller.
    ///
    /// The search text is committed immediately; there is no one left to type
    /// after the command line is parsed. Size and sort are applied before the
    /// page so their page resets don't discard an explicit `--page`.
    pub fn apply<T: DeserializeOwned>(&self, query: &mut ResourceQuery<T>) -> Result<(), ValidationError> {
        if let Some(search) = &self.search {
            query.set_raw_filter(search.as_str());
            query.flush_filter();
        }

        if let Some(size) = self.size {
            query.set_page_size(size)?;
        }

        match (&self.sort_by, self.sort_dir) {
            (Some(field), dir) => query.set_sort(field.as_str(), dir.unwrap_or(SortDirection::Asc)),
            (None, Some(_)) => return Err(ValidationError::field("sort-dir", "requires --sort-by")),
            (None, None) => {}
        }

        if let Some(page) = self.page {
            query.set_page(page);
        }

        Ok(())
    }
}
