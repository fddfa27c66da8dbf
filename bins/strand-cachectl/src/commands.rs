// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command implementations. Every command writes to the given sink so tests
//! can capture output without spawning a process.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use comfy_table::Table;
use serde::Serialize;
use strand_plan_cache::{summarize_entry, GraphKey};
use strand_store::PlanStore;
use strand_store_fs::{FsEntry, FsPlanStore};
use tracing::{info, warn};

use crate::cli::{Cli, Command, OutputFormat};

pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let store = match &cli.root {
        Some(root) => FsPlanStore::open(root)
            .with_context(|| format!("opening plan store at {}", root.display()))?,
        None => FsPlanStore::open_default().context("opening default plan store")?,
    };

    match &cli.command {
        Command::Stats => stats(&store, cli.format, out),
        Command::List => list(&store, cli.format, out),
        Command::Inspect { digest, raw } => inspect(&store, digest, *raw, cli.format, out),
        Command::Clear { yes } => clear(&store, *yes, out),
    }
}

#[derive(Serialize)]
struct EntryRow {
    digest: String,
    epoch: Option<u64>,
    nodes: Option<usize>,
    terminals: Option<usize>,
    format: Option<u16>,
    key_bytes: usize,
    value_bytes: usize,
}

#[derive(Serialize)]
struct StatsReport {
    root: PathBuf,
    entries: usize,
    key_bytes: usize,
    value_bytes: usize,
    unreadable: usize,
    entries_by_epoch: BTreeMap<u64, usize>,
}

#[derive(Serialize)]
struct InspectReport {
    digest: String,
    epoch: u64,
    format: Option<u16>,
    terminal_outputs: Vec<(String, String)>,
    node_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_value: Option<String>,
}

fn rows(store: &FsPlanStore) -> Result<Vec<EntryRow>> {
    let mut rows = Vec::new();
    for FsEntry {
        digest,
        key_len,
        value_len,
        ..
    } in store.entries()?
    {
        let mut row = EntryRow {
            digest,
            epoch: None,
            nodes: None,
            terminals: None,
            format: None,
            key_bytes: key_len,
            value_bytes: value_len,
        };
        if let Some((key, value)) = store.read_entry(&row.digest)? {
            match GraphKey::from_store_key(&key) {
                Ok(graph_key) => {
                    row.epoch = Some(graph_key.epoch());
                    row.nodes = Some(graph_key.node_keys().len());
                    row.terminals = Some(graph_key.terminal_outputs().len());
                }
                Err(err) => warn!(digest = %row.digest, ?err, "unreadable graph key"),
            }
            row.format = summarize_entry(&value).ok().map(|s| s.format);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn stats(store: &FsPlanStore, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let rows = rows(store)?;
    let mut entries_by_epoch = BTreeMap::new();
    for epoch in rows.iter().filter_map(|r| r.epoch) {
        *entries_by_epoch.entry(epoch).or_insert(0) += 1;
    }
    let report = StatsReport {
        root: store.root().to_path_buf(),
        entries: rows.len(),
        key_bytes: rows.iter().map(|r| r.key_bytes).sum(),
        value_bytes: rows.iter().map(|r| r.value_bytes).sum(),
        unreadable: rows.iter().filter(|r| r.epoch.is_none()).count(),
        entries_by_epoch,
    };

    match format {
        OutputFormat::Json => write_json(out, &report),
        OutputFormat::Text => {
            writeln!(out, "root:        {}", report.root.display())?;
            writeln!(out, "entries:     {}", report.entries)?;
            writeln!(out, "key bytes:   {}", report.key_bytes)?;
            writeln!(out, "value bytes: {}", report.value_bytes)?;
            writeln!(out, "unreadable:  {}", report.unreadable)?;
            for (epoch, count) in &report.entries_by_epoch {
                writeln!(out, "epoch {epoch}: {count}")?;
            }
            Ok(())
        }
    }
}

fn list(store: &FsPlanStore, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let rows = rows(store)?;
    match format {
        OutputFormat::Json => write_json(out, &rows),
        OutputFormat::Text => {
            let mut table = Table::new();
            table.set_header(vec![
                "digest", "epoch", "nodes", "terminals", "format", "key", "value",
            ]);
            for r in &rows {
                table.add_row(vec![
                    r.digest.get(..16).unwrap_or(r.digest.as_str()).to_owned(),
                    opt(r.epoch),
                    opt(r.nodes),
                    opt(r.terminals),
                    opt(r.format),
                    r.key_bytes.to_string(),
                    r.value_bytes.to_string(),
                ]);
            }
            writeln!(out, "{table}")?;
            Ok(())
        }
    }
}

fn inspect(
    store: &FsPlanStore,
    prefix: &str,
    raw: bool,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let prefix = prefix.to_ascii_lowercase();
    let matches: Vec<FsEntry> = store
        .entries()?
        .into_iter()
        .filter(|e| e.digest.starts_with(&prefix))
        .collect();
    let digest = match matches.as_slice() {
        [] => bail!("no entry matches digest prefix {prefix:?}"),
        [one] => one.digest.clone(),
        many => bail!(
            "digest prefix {prefix:?} is ambiguous ({} entries match)",
            many.len()
        ),
    };
    let Some((key, value)) = store.read_entry(&digest)? else {
        bail!("entry {digest} disappeared while reading");
    };
    let graph_key = GraphKey::from_store_key(&key).context("decoding graph key")?;
    let summary = summarize_entry(&value);
    if let Err(err) = &summary {
        warn!(%digest, ?err, "unreadable stored plan");
    }

    let report = InspectReport {
        digest,
        epoch: graph_key.epoch(),
        format: summary.as_ref().ok().map(|s| s.format),
        terminal_outputs: graph_key
            .terminal_outputs()
            .iter()
            .map(|(r, s)| (r.to_string(), s.to_string()))
            .collect(),
        node_keys: match &summary {
            Ok(s) => s.node_keys.iter().map(ToString::to_string).collect(),
            Err(_) => graph_key.node_keys().iter().map(ToString::to_string).collect(),
        },
        raw_key: raw.then(|| hex::encode(&key)),
        raw_value: raw.then(|| hex::encode(&value)),
    };

    match format {
        OutputFormat::Json => write_json(out, &report),
        OutputFormat::Text => {
            writeln!(out, "digest: {}", report.digest)?;
            writeln!(out, "epoch:  {}", report.epoch)?;
            writeln!(out, "format: {}", opt(report.format))?;
            writeln!(out, "terminal outputs ({}):", report.terminal_outputs.len())?;
            for (requirement, spec) in &report.terminal_outputs {
                writeln!(out, "  {requirement} -> {spec}")?;
            }
            writeln!(out, "nodes ({}):", report.node_keys.len())?;
            for (i, node) in report.node_keys.iter().enumerate() {
                writeln!(out, "  #{i} {node}")?;
            }
            if let (Some(k), Some(v)) = (&report.raw_key, &report.raw_value) {
                writeln!(out, "raw key:   {k}")?;
                writeln!(out, "raw value: {v}")?;
            }
            Ok(())
        }
    }
}

fn clear(store: &FsPlanStore, yes: bool, out: &mut dyn Write) -> Result<()> {
    let count = store.len()?;
    if !yes {
        bail!(
            "refusing to clear {count} entries under {} without --yes",
            store.root().display()
        );
    }
    store.clear()?;
    info!(root = %store.root().display(), removed = count, "plan store cleared");
    writeln!(out, "removed {count} entries")?;
    Ok(())
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}
