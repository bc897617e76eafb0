//! Cache management commands

use std::path::PathBuf;

use adminop::Result;
use adminop::cache::CacheStorage;
use adminop::config::Config;
use chrono::{DateTime, Local, Utc};

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;

/// Cache directory: `cache_dir` from config, else the platform default
fn resolve_dir(opts: &GlobalOptions) -> Result<PathBuf> {
    let config = Config::load_or_default(opts.config_ref())?;
    match config.cache_dir {
        Some(dir) => Ok(dir),
        None => Ok(CacheStorage::cache_dir()?),
    }
}

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let dir = resolve_dir(opts)?;
    let stats = CacheStorage::open_at(&dir)?.stats()?;

    match opts.format {
        OutputFormat::Json => {
            let resources: serde_json::Map<String, serde_json::Value> = stats
                .per_resource
                .iter()
                .map(|(name, count)| (name.clone(), (*count).into()))
                .collect();
            let json = serde_json::json!({
                "total_entries": stats.total_entries,
                "stale_entries": stats.stale_entries,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
                "oldest_entry_timestamp": stats.oldest_entry,
                "newest_entry_timestamp": stats.newest_entry,
                "resources": resources,
                "path": dir.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", dir.display());
            println!("Entries:        {}", stats.total_entries);
            println!("Stale:          {}", stats.stale_entries);
            println!("Total size:     {}", format_size(stats.total_size_bytes));

            if let Some(oldest) = stats.oldest_entry {
                println!("Oldest entry:   {}", local_time(oldest));
            }
            if let Some(newest) = stats.newest_entry {
                println!("Newest entry:   {}", local_time(newest));
            }

            if !stats.per_resource.is_empty() {
                println!();
                for (resource, count) in &stats.per_resource {
                    println!("  {:<16}{}", resource, count);
                }
            }
        }
    }

    Ok(())
}

/// Clear all cache entries
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let dir = resolve_dir(opts)?;
    let stats = CacheStorage::open_at(&dir)?.clear_all()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if stats.entries_removed > 0 {
                println!("Cleared {} cache entries", stats.entries_removed);
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", resolve_dir(opts)?.display());
    Ok(())
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Format bytes as human-readable size
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
