//! obdagate CLI
//!
//! - Mapping documents: check templates, reconcile the instantiated document
//!   against the live schema, instantiate and persist, show mapping edges
//! - Schema: list the configured catalog
//! - Gate: build the allow-list, manage access levels, run gated queries

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod gate_cmd;
mod mapping_cmd;

use config::ObdagateConfig;

#[derive(Parser)]
#[command(name = "obdagate")]
#[command(author, version, about = "OBDA mapping reconciliation and query gate")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for `obdagate.json` / environment settings.
#[derive(Args, Debug)]
struct GlobalArgs {
    /// Config file (default: ./obdagate.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Template mapping document
    #[arg(long, global = true)]
    template: Option<PathBuf>,
    /// Instantiated mapping document
    #[arg(long, global = true)]
    instantiated: Option<PathBuf>,
    /// SQLite database to read the schema from
    #[arg(long, global = true)]
    sqlite: Option<PathBuf>,
    /// DuckDB database to read the schema from
    #[arg(long, global = true)]
    duckdb: Option<PathBuf>,
    /// SQL DDL file to read the schema from
    #[arg(long, global = true)]
    ddl: Option<PathBuf>,
    /// Allow-list JSON
    #[arg(long, global = true)]
    allowlist: Option<PathBuf>,
    /// Level store JSON
    #[arg(long, global = true)]
    levels: Option<PathBuf>,
    /// Downstream SPARQL endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

impl GlobalArgs {
    fn resolve(&self) -> Result<ObdagateConfig> {
        let mut cfg = ObdagateConfig::load(self.config.as_deref())?.with_env()?;
        if let Some(p) = &self.template {
            cfg.mapping.template = p.clone();
        }
        if let Some(p) = &self.instantiated {
            cfg.mapping.instantiated = p.clone();
        }
        if let Some(p) = &self.sqlite {
            cfg.catalog.sqlite = Some(p.clone());
        }
        if let Some(p) = &self.duckdb {
            cfg.catalog.duckdb = Some(p.clone());
            if self.sqlite.is_none() {
                cfg.catalog.sqlite = None;
            }
        }
        if let Some(p) = &self.ddl {
            cfg.catalog.ddl = Some(p.clone());
            if self.sqlite.is_none() {
                cfg.catalog.sqlite = None;
            }
            if self.duckdb.is_none() {
                cfg.catalog.duckdb = None;
            }
        }
        if let Some(p) = &self.allowlist {
            cfg.gate.allowlist_path = p.clone();
        }
        if let Some(p) = &self.levels {
            cfg.gate.levels_path = p.clone();
        }
        if let Some(url) = &self.endpoint {
            cfg.gate.endpoint = url.clone();
        }
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Mapping documents (template and instantiated).
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },

    /// List the tables and columns of the configured schema catalog.
    Schema {
        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// Allow-list of approved query templates.
    Allowlist {
        #[command(subcommand)]
        command: AllowlistCommands,
    },

    /// Access levels.
    Level {
        #[command(subcommand)]
        command: LevelCommands,
    },

    /// Run one query through the authorization gate.
    ///
    /// `--template` and `--query` take the text itself, or `@path` to read it
    /// from a file.
    Query {
        #[arg(long)]
        template: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        identity: Option<String>,
        /// Print result rows as a table instead of the relayed JSON
        #[arg(long)]
        table: bool,
    },
}

#[derive(Subcommand)]
enum MappingCommands {
    /// Parse a mapping document and list its blocks.
    Check {
        /// Document to check (default: the configured template)
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Reconcile the instantiated document against the template and schema.
    Reconcile,

    /// Instantiate the template and replace the instantiated document.
    Instantiate {
        /// Selection JSON: `{"<mappingId>": {"table": "...", "connections": {"0": 1}}}`
        #[arg(long, conflicts_with = "reconciled", required_unless_present = "reconciled")]
        selection: Option<PathBuf>,
        /// Re-save the current reconciliation (after a schema change)
        #[arg(long)]
        reconciled: bool,
        /// Print the document instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show column -> ontology property edges.
    Graph {
        /// Selection JSON (default: the current reconciliation)
        #[arg(long)]
        selection: Option<PathBuf>,
        /// Emit a Mermaid diagram
        #[arg(long)]
        mermaid: bool,
    },
}

#[derive(Subcommand)]
enum AllowlistCommands {
    /// Hash every query of a Markdown catalog into the allow-list.
    Load {
        catalog: PathBuf,
        /// Output allow-list (default: the configured allow-list)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Start from an empty list instead of updating the existing one
        #[arg(long)]
        fresh: bool,
    },

    /// List allow-list entries.
    List,
}

#[derive(Subcommand)]
enum LevelCommands {
    /// Show the level granted to a caller (or the global level).
    Get {
        #[arg(long)]
        identity: Option<String>,
    },

    /// Set the global level, or one identity's level.
    Set {
        /// `L0`..`L6`, a digit, or a level label
        level: String,
        #[arg(long)]
        identity: Option<String>,
    },

    /// List the available levels.
    List,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Mapping { command } => {
            let cfg = cli.global.resolve()?;
            match command {
                MappingCommands::Check { file, json } => {
                    let path = file.unwrap_or_else(|| cfg.mapping.template.clone());
                    mapping_cmd::cmd_check(&path, json)?;
                }
                MappingCommands::Reconcile => mapping_cmd::cmd_reconcile(&cfg)?,
                MappingCommands::Instantiate {
                    selection,
                    reconciled,
                    dry_run,
                } => mapping_cmd::cmd_instantiate(&cfg, selection.as_deref(), reconciled, dry_run)?,
                MappingCommands::Graph { selection, mermaid } => {
                    mapping_cmd::cmd_graph(&cfg, selection.as_deref(), mermaid)?
                }
            }
        }
        Commands::Schema { json } => {
            let cfg = cli.global.resolve()?;
            mapping_cmd::cmd_schema(&cfg, json)?;
        }
        Commands::Allowlist { command } => {
            let cfg = cli.global.resolve()?;
            match command {
                AllowlistCommands::Load {
                    catalog,
                    out,
                    fresh,
                } => {
                    let out = out.unwrap_or_else(|| cfg.gate.allowlist_path.clone());
                    gate_cmd::cmd_allowlist_load(&catalog, &out, fresh)?;
                }
                AllowlistCommands::List => gate_cmd::cmd_allowlist_list(&cfg)?,
            }
        }
        Commands::Level { command } => {
            let cfg = cli.global.resolve()?;
            match command {
                LevelCommands::Get { identity } => gate_cmd::cmd_level_get(&cfg, identity.as_deref())?,
                LevelCommands::Set { level, identity } => {
                    gate_cmd::cmd_level_set(&cfg, &level, identity.as_deref())?
                }
                LevelCommands::List => gate_cmd::cmd_level_list(),
            }
        }
        Commands::Query {
            template,
            query,
            identity,
            table,
        } => {
            let cfg = cli.global.resolve()?;
            gate_cmd::cmd_query(&cfg, &template, &query, identity, table)?;
        }
    }
    Ok(())
}
