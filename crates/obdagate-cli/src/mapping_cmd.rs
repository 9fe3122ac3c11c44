//! `obdagate mapping ...` and `obdagate schema`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use obdagate_engine::{instantiate, to_mermaid, MappingSession, Selection};
use obdagate_mapping::parse_mapping_document;
use obdagate_storage::MappingStore;

use crate::config::ObdagateConfig;

fn open_session(cfg: &ObdagateConfig) -> Result<MappingSession> {
    let template = &cfg.mapping.template;
    let text = fs::read_to_string(template)
        .with_context(|| format!("reading template {}", template.display()))?;
    let session = MappingSession::open(&text, MappingStore::new(&cfg.mapping.instantiated))
        .with_context(|| format!("parsing template {}", template.display()))?;
    Ok(session)
}

fn read_selection(path: &Path) -> Result<Selection> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading selection {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing selection {}", path.display()))
}

pub fn cmd_check(path: &Path, json: bool) -> Result<()> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc = parse_mapping_document(&text).with_context(|| format!("parsing {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "{} {} ({} blocks, {} failed)",
        "Checked".green().bold(),
        path.display(),
        doc.blocks.len(),
        doc.failures.len()
    );
    for block in &doc.blocks {
        let (target, filters) = block.placeholders.split_at(block.target_arity);
        println!(
            "  {} {} {}",
            block.id.bold(),
            "table:".dimmed(),
            block.default_table.as_deref().unwrap_or("-")
        );
        println!("      {} {}", "target:".dimmed(), target.join(", "));
        if !filters.is_empty() {
            println!("      {} {}", "filter:".dimmed(), filters.join(", "));
        }
    }
    for failure in &doc.failures {
        eprintln!(
            "  {} line {}{}: {}",
            "failed".red().bold(),
            failure.line,
            failure
                .mapping_id
                .as_deref()
                .map(|id| format!(" ({id})"))
                .unwrap_or_default(),
            failure.message
        );
    }
    Ok(())
}

pub fn cmd_reconcile(cfg: &ObdagateConfig) -> Result<()> {
    let session = open_session(cfg)?;
    let catalog = cfg.catalog()?;
    let reconciliation = session.reconcile(catalog.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&reconciliation)?);
    Ok(())
}

pub fn cmd_instantiate(
    cfg: &ObdagateConfig,
    selection: Option<&Path>,
    reconciled: bool,
    dry_run: bool,
) -> Result<()> {
    let session = open_session(cfg)?;
    let catalog = cfg.catalog()?;
    let selection = match selection {
        Some(path) => read_selection(path)?,
        None if reconciled => session.reconcile(catalog.as_ref())?.into_selection(),
        None => anyhow::bail!("either --selection or --reconciled is required"),
    };

    if dry_run {
        let schema = catalog.snapshot()?;
        let template = session.template();
        print!("{}", instantiate(&template.header, &template.blocks, &selection, &schema)?);
        return Ok(());
    }

    let text = session.save(&selection, catalog.as_ref())?;
    eprintln!(
        "{} {} ({} bytes, {} blocks)",
        "wrote".green().bold(),
        session.store().path().display().to_string().bold(),
        text.len(),
        selection.values().filter(|s| s.table.is_some()).count()
    );
    Ok(())
}

pub fn cmd_graph(cfg: &ObdagateConfig, selection: Option<&Path>, mermaid: bool) -> Result<()> {
    let session = open_session(cfg)?;
    let catalog = cfg.catalog()?;
    let selection = match selection {
        Some(path) => read_selection(path)?,
        None => session.reconcile(catalog.as_ref())?.into_selection(),
    };
    let edges = session.graph(&selection, catalog.as_ref())?;

    if mermaid {
        print!("{}", to_mermaid(&edges));
        return Ok(());
    }
    for edge in &edges {
        let from = match &edge.table {
            Some(t) => format!("{t}.{}", edge.column),
            None => edge.column.clone(),
        };
        let arrow = if edge.bound { "->".green() } else { "->".yellow() };
        println!("{:<24} {} {arrow} {}", edge.block_id.bold(), from, edge.property);
    }
    Ok(())
}

pub fn cmd_schema(cfg: &ObdagateConfig, json: bool) -> Result<()> {
    let snapshot = cfg.catalog()?.snapshot()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    for (table, columns) in &snapshot.tables {
        println!("{}", table.bold());
        for column in columns {
            println!("  {column}");
        }
    }
    Ok(())
}
