use anyhow::Result;
use chrono::DateTime;
use log::debug;
use serde::Serialize;

use crate::{
    runtime::Runtime,
    state::{InstallReason, InstallRecord, StateStore},
};

use super::config::Config;

#[derive(Debug, Serialize)]
struct ListEntry<'r> {
    name: &'r str,
    reason: InstallReason,
    timestamp: i64,
    installed_at: String,
}

impl<'r> From<&'r InstallRecord> for ListEntry<'r> {
    fn from(record: &'r InstallRecord) -> Self {
        Self {
            name: &record.name,
            reason: record.reason,
            timestamp: record.timestamp,
            installed_at: format_timestamp(record.timestamp),
        }
    }
}

/// List all installed packages
#[tracing::instrument(skip(runtime, config))]
pub fn list<R: Runtime>(runtime: R, config: Config, json: bool) -> Result<()> {
    let store = StateStore::new(&runtime, config.registry_path(), &config.repo);
    let records = store.registry().installed_records()?;
    debug!("Found {} installed package(s)", records.len());

    if json {
        let entries: Vec<ListEntry> = records.iter().map(ListEntry::from).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }
    for record in &records {
        println!("{}", render_record(record));
    }
    Ok(())
}

fn render_record(record: &InstallRecord) -> String {
    format!(
        "{} {} {}",
        record.name,
        record.reason,
        format_timestamp(record.timestamp)
    )
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
