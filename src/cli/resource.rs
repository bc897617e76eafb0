//! Resource commands: list, get, create, update, delete

use std::time::Duration;

use colored::Colorize;
use dialoguer::{Input, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use serde_json::Value;

use adminop::client::Page;
use adminop::confirm::{ConfirmationGate, SubmitOutcome};
use adminop::error::{ConfirmError, ValidationError};
use adminop::resource::{Record, ResourceKind, record_id};
use adminop::validation::{validate_create, validate_update};
use adminop::Result;

use crate::cli::{CommandContext, OutputFormat};
use crate::cli::args::{GlobalOptions, ListArgs, PayloadArgs};
use crate::output::json::{JsonOutput, format_json};
use crate::output::table::{TableStyle, format_records};
use crate::output::{self, RecordDetail, RecordList};

/// Spinner on stderr while a request runs; hidden for JSON output
fn spinner(format: OutputFormat, message: String) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// List one page of a resource collection
pub async fn list(opts: &GlobalOptions, kind: ResourceKind, args: &ListArgs, refresh: bool) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let mut query = ctx.console.list::<Record>(kind);
    args.apply(&mut query)?;

    let bar = spinner(ctx.format, format!("Loading {}...", kind));
    let view = if refresh {
        query.refetch().await
    } else {
        query.fetch().await
    };
    bar.finish_and_clear();

    if let Some(err) = view.error {
        return Err(err.into());
    }

    let params = query.params();
    let page = view.page.unwrap_or_else(|| Page::empty(params.page, params.size));
    debug!(
        "{} page {}: {} of {} items",
        kind,
        page.page_index,
        page.content.len(),
        page.total_elements
    );

    output::print(
        &RecordList {
            descriptor: query.descriptor(),
            page: &page,
        },
        ctx.format,
    )
}

/// Show a single entity
pub async fn get(opts: &GlobalOptions, kind: ResourceKind, id: &str) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    let bar = spinner(ctx.format, format!("Loading {} {}...", kind, id));
    let record = ctx.console.get::<Record>(kind, id).await;
    bar.finish_and_clear();

    output::print(&RecordDetail { record: &record? }, ctx.format)
}

/// Create an entity
pub async fn create(opts: &GlobalOptions, kind: ResourceKind, payload: &PayloadArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let mutation = ctx.console.mutation::<Record>(kind);

    let record = payload.to_record()?;
    validate_create(mutation.descriptor(), &record)?;

    let bar = spinner(ctx.format, format!("Creating {}...", kind));
    let created = mutation.create(&record).await;
    bar.finish_and_clear();
    let created = created?;

    if ctx.format != OutputFormat::Json {
        let id = record_id(&created).unwrap_or_else(|| "?".to_string());
        eprintln!("{} Created {} {}", "✓".green(), kind, id);
    }
    output::print(&RecordDetail { record: &created }, ctx.format)
}

/// Update fields of an entity
pub async fn update(opts: &GlobalOptions, kind: ResourceKind, id: &str, payload: &PayloadArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let mutation = ctx.console.mutation::<Record>(kind);

    let record = payload.to_record()?;
    validate_update(mutation.descriptor(), &record)?;

    let bar = spinner(ctx.format, format!("Updating {} {}...", kind, id));
    let updated = mutation.update(id, &record).await;
    bar.finish_and_clear();
    let updated = updated?;

    if ctx.format != OutputFormat::Json {
        eprintln!("{} Updated {} {}", "✓".green(), kind, id);
    }
    output::print(&RecordDetail { record: &updated }, ctx.format)
}

/// Delete an entity after the operator retypes its identifying text.
///
/// With `--confirm` the text is taken from the command line and a mismatch
/// is an error. Otherwise the operator is prompted until the text matches
/// or they submit an empty line.
pub async fn delete(
    opts: &GlobalOptions,
    kind: ResourceKind,
    id: &str,
    confirm: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let descriptor = ctx.console.descriptor(kind);
    let type_name = descriptor.type_name();

    // Fresh read so the confirmation text reflects the latest state
    ctx.console.cache().invalidate(|key| key.is_item(type_name, id));
    let record = ctx.console.get::<Record>(kind, id).await?;

    let gate = ctx.console.confirmation(kind);
    gate.open_for(&record)?;
    let expected = match gate.challenge() {
        Some(challenge) => challenge.expected_text,
        None => return Err(ConfirmError::NotOpen.into()),
    };

    if dry_run {
        eprintln!("{}", "DRY RUN - no changes will be made".yellow());
        eprintln!();
        eprintln!("Would delete {} \"{}\" (ID: {})", kind, expected, id);
        gate.cancel()?;
        return Ok(());
    }

    let mutation = ctx.console.mutation::<Value>(kind);

    if let Some(text) = confirm {
        gate.type_text(text)?;
        return match gate.confirm_delete(&mutation).await? {
            SubmitOutcome::Mismatch { message } => {
                Err(ValidationError::field("--confirm", format!("does not match, {}", message)).into())
            }
            SubmitOutcome::Executed(result) => {
                result?;
                report_deleted(ctx.format, kind, id, &expected)
            }
        };
    }

    eprintln!(
        "{} Delete {} \"{}\"? This cannot be undone.",
        "⚠".yellow(),
        kind,
        expected
    );
    eprintln!();

    loop {
        let Some(text) = prompt_confirmation(&gate)? else {
            gate.cancel()?;
            eprintln!("Cancelled.");
            return Ok(());
        };

        gate.type_text(text)?;
        match gate.confirm_delete(&mutation).await? {
            SubmitOutcome::Mismatch { message } => {
                eprintln!("{} {}", "✗".red(), message);
            }
            SubmitOutcome::Executed(Ok(_)) => return report_deleted(ctx.format, kind, id, &expected),
            SubmitOutcome::Executed(Err(e)) => {
                if gate.is_idle() {
                    return Err(e.into());
                }
                eprintln!("{} {}", "✗".red(), e);
            }
        }
    }
}

/// Prompt for the confirmation text; `None` when the operator gives up
fn prompt_confirmation(gate: &ConfirmationGate) -> Result<Option<String>> {
    let Some(challenge) = gate.challenge() else {
        return Ok(None);
    };

    let text: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Type '{}' to confirm (empty to cancel)",
            challenge.expected_text
        ))
        .allow_empty(true)
        .interact_text()?;

    if text.is_empty() { Ok(None) } else { Ok(Some(text)) }
}

fn report_deleted(format: OutputFormat, kind: ResourceKind, id: &str, label: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = JsonOutput::new(serde_json::json!({
                "deleted": true,
                "resource": kind.type_name(),
                "id": id,
            }));
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            eprintln!("{} Deleted {} \"{}\"", "✓".green(), kind, label);
        }
    }
    Ok(())
}

/// List every resource kind with its backend path and identity field
pub fn kinds(format: OutputFormat) -> Result<()> {
    const COLUMNS: &[&str] = &["kind", "path", "confirmWith", "freshFor"];

    let rows: Vec<Record> = ResourceKind::ALL
        .iter()
        .map(|kind| {
            let descriptor = kind.descriptor();
            let mut row = Record::new();
            row.insert("kind".into(), kind.type_name().into());
            row.insert("path".into(), descriptor.path.into());
            row.insert("confirmWith".into(), descriptor.identity_field.into());
            row.insert("freshFor".into(), format!("{}s", descriptor.stale_time.as_secs()).into());
            row
        })
        .collect();

    let output = match format {
        OutputFormat::Json => format_json(&rows)?,
        OutputFormat::Table => format_records(COLUMNS, &rows, TableStyle::Plain),
        OutputFormat::Pretty => format_records(COLUMNS, &rows, TableStyle::Rounded),
    };
    println!("{}", output);
    Ok(())
}
