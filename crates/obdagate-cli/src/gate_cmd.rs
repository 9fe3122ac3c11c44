//! `obdagate allowlist|level|query`.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;

use obdagate_gate::{
    AccessLevel, AllowList, Decision, Gate, GateRequest, LevelPolicy, LevelStore, SparqlResults,
};

use crate::config::ObdagateConfig;

pub fn cmd_allowlist_load(catalog: &Path, out: &Path, fresh: bool) -> Result<()> {
    let markdown = fs::read_to_string(catalog)
        .with_context(|| format!("reading catalog {}", catalog.display()))?;
    let mut list = if fresh || !out.exists() {
        AllowList::new()
    } else {
        AllowList::load(out)?
    };
    let loaded = list.load_catalog_markdown(&markdown)?;
    list.save(out)?;
    eprintln!(
        "{} {} queries into {} ({} entries)",
        "Loaded".green().bold(),
        loaded,
        out.display().to_string().bold(),
        list.len()
    );
    Ok(())
}

pub fn cmd_allowlist_list(cfg: &ObdagateConfig) -> Result<()> {
    let list = AllowList::load(&cfg.gate.allowlist_path)?;
    for (digest, entry) in list.iter() {
        println!(
            "{} {} {}",
            entry.level.to_string().bold(),
            &digest[..digest.len().min(12)],
            obdagate_gate::normalize_ws(&entry.template).dimmed()
        );
    }
    Ok(())
}

pub fn cmd_level_get(cfg: &ObdagateConfig, identity: Option<&str>) -> Result<()> {
    let state = LevelStore::new(&cfg.gate.levels_path).load()?;
    let policy = match identity {
        Some(_) => cfg.gate.level_policy,
        None => LevelPolicy::Global,
    };
    let level = state.granted(policy, identity);
    println!("{level} - {}", level.label());
    Ok(())
}

pub fn cmd_level_set(cfg: &ObdagateConfig, level: &str, identity: Option<&str>) -> Result<()> {
    let level: AccessLevel = level.parse()?;
    LevelStore::new(&cfg.gate.levels_path).set(identity, level)?;
    eprintln!(
        "{} {} to {} - {}",
        "Set".green().bold(),
        identity.unwrap_or("global level"),
        level.to_string().bold(),
        level.label()
    );
    Ok(())
}

pub fn cmd_level_list() {
    for level in AccessLevel::ALL {
        println!("{level} - {}", level.label());
    }
}

/// `@path` reads the text from a file; anything else is taken literally.
fn text_arg(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {path}")),
        None => Ok(arg.to_string()),
    }
}

pub fn cmd_query(
    cfg: &ObdagateConfig,
    template: &str,
    query: &str,
    identity: Option<String>,
    table: bool,
) -> Result<()> {
    let request = GateRequest {
        template: text_arg(template)?,
        query: text_arg(query)?,
        identity,
    };
    let gate = Gate::from_config(&cfg.gate)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let outcome = runtime.block_on(async { gate.handle(&request).await });

    let response = match outcome {
        Ok(response) => response,
        Err(err) => {
            println!("{}", err.body());
            return Err(anyhow!("gate rejected the request (status {}): {err}", err.status_code()));
        }
    };

    if table && response.decision == Decision::Admitted {
        let results = SparqlResults::parse(&response.body)?;
        if let Some(answer) = results.boolean {
            println!("{answer}");
        }
        if !results.head.vars.is_empty() {
            println!("{}", results.head.vars.join("\t").bold());
        }
        for row in results.rows() {
            println!("{}", row.join("\t"));
        }
    } else {
        println!("{}", response.body);
    }
    Ok(())
}
