//! criteria: compile criteria documents into SQL
//!
//! # Usage
//!
//! ```bash
//! # Compile a query document against a schema
//! criteria compile query.json --schema schema.toml
//!
//! # JSON output, with the paged data query
//! criteria compile query.json --schema schema.toml --format json --page 2 --rows 20
//!
//! # List registered entities
//! criteria entities --schema schema.toml
//!
//! # Translate an x-expression
//! criteria check 'sum[Order->total].as.total'
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use criteria_sql::config::{Config, ConfigBuilder, OutputFormat};
use criteria_sql::parser;
use criteria_sql::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "criteria")]
#[command(version)]
#[command(about = "Compile filter criteria into SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    criteria compile query.json --schema schema.toml
    criteria entities --schema schema.json
    criteria check 'Order->id.as.oid'")]
struct Cli {
    /// Entity schema (TOML or JSON); overrides the config file
    #[arg(short, long, global = true, env = "CRITERIA_SCHEMA")]
    schema: Option<PathBuf>,

    /// Output format; overrides the config file
    #[arg(short, long, global = true, value_enum)]
    format: Option<Format>,

    /// Config file (default: <config dir>/criteria-sql/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query document
    Compile {
        /// Path to the query document
        query: PathBuf,

        /// Also print the data query for this page
        #[arg(long)]
        page: Option<u32>,

        /// Page size used with --page
        #[arg(long, default_value_t = 20)]
        rows: u32,
    },
    /// List registered entities and their fields
    Entities,
    /// Validate and translate an x-expression
    Check {
        /// e.g. `Order->id.as.oid`
        expression: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CRITERIA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    if !config.color {
        colored::control::set_override(false);
    }

    match &cli.command {
        Commands::Compile { query, page, rows } => {
            let registry = load_registry(&config)?;
            let paging = page.map(|p| Paging::new(p, *rows));
            compile_document(query, &registry, paging, config.output)
        }
        Commands::Entities => {
            let registry = load_registry(&config)?;
            show_entities(&registry, config.output)
        }
        Commands::Check { expression } => check_expression(expression, config.output),
    }
}

/// File values first, then command-line flags on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::load_default().context("Failed to read default config")?,
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(schema) = &cli.schema {
        builder = builder.schema(schema.clone());
    }
    if let Some(format) = cli.format {
        builder = builder.output(format.into());
    }
    if cli.no_color {
        builder = builder.color(false);
    }
    Ok(builder.build())
}

fn load_registry(config: &Config) -> Result<Registry> {
    let path = config
        .schema_path
        .as_ref()
        .context("No schema given. Use --schema or set schema_path in the config file")?;
    let registry = Registry::load(path)
        .with_context(|| format!("Failed to load schema {}", path.display()))?;
    tracing::debug!(entities = registry.len(), "schema loaded");
    Ok(registry)
}

fn compile_document(
    path: &Path,
    registry: &Registry,
    paging: Option<Paging>,
    output: OutputFormat,
) -> Result<()> {
    let document = QueryDocument::load(path)
        .with_context(|| format!("Failed to read query {}", path.display()))?;
    let criteria = document.build(registry)?;
    let sql = compile(&criteria, registry)?;

    // explicit flag first, then the document's own paging
    let paging = paging.or(criteria.paging());
    let paged = paging.map(|p| sql.paged(&p));

    match output {
        OutputFormat::Json => {
            let mapper = sql.mapper.as_ref().map(|m| {
                m.iter()
                    .map(|(logical, physical)| (logical.to_string(), physical.to_string()))
                    .collect::<std::collections::BTreeMap<_, _>>()
            });
            let out = serde_json::json!({
                "count": sql.count,
                "data": sql.data,
                "template": sql.template,
                "binds": sql.binds,
                "paged": paged,
                "mapper": mapper,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{}", "Count:".green().bold());
            println!("  {}", sql.count.white());
            println!("{}", "Data:".green().bold());
            println!("  {}", sql.data.white());
            println!("{}", "Template:".green().bold());
            println!("  {}", sql.template.white());
            if let Some(paged) = paged {
                println!("{}", "Paged:".green().bold());
                println!("  {}", paged.white());
            }

            if !sql.binds.is_empty() {
                println!();
                println!("{}", "Bindings:".cyan());
                for (i, b) in sql.binds.iter().enumerate() {
                    println!("  ?{} = {}", i + 1, b.to_string().yellow());
                }
            }

            if let Some(mapper) = &sql.mapper {
                let mut names: Vec<_> = mapper.iter().collect();
                names.sort();
                println!();
                println!("{}", "Names:".cyan());
                for (logical, physical) in names {
                    println!("  {} {} {}", logical.white(), "→".dimmed(), physical.yellow());
                }
            }
        }
    }
    Ok(())
}

fn show_entities(registry: &Registry, output: OutputFormat) -> Result<()> {
    let entities = registry.entities();

    if output == OutputFormat::Json {
        let out: Vec<_> = entities
            .iter()
            .map(|e| {
                let fields: Vec<_> = e
                    .fields()
                    .map(|(property, f)| {
                        serde_json::json!({
                            "property": property,
                            "column": f.column,
                            "type": f.kind,
                            "nullable": f.nullable,
                        })
                    })
                    .collect();
                serde_json::json!({ "entity": e.name, "table": e.table, "fields": fields })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if entities.is_empty() {
        println!("{}", "(no entities)".dimmed());
        return Ok(());
    }

    for entity in &entities {
        println!("{} {} {}", entity.name.cyan().bold(), "→".dimmed(), entity.table.white());
        for (property, field) in entity.fields() {
            let kind = format!("{:?}", field.kind).to_lowercase();
            let nullable = if field.nullable { "?" } else { "" };
            println!(
                "    {:20} {:20} {}{}",
                property.white(),
                field.column.yellow(),
                kind.dimmed(),
                nullable.dimmed()
            );
        }
    }
    println!();
    println!("{} entit(ies) registered", entities.len().to_string().cyan());
    Ok(())
}

fn check_expression(expression: &str, output: OutputFormat) -> Result<()> {
    let parsed = parser::x_expression(expression)?;

    match output {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "input": expression,
                "sql": parsed.to_string(),
                "function": parsed.func,
                "entity": parsed.entity,
                "property": parsed.property,
                "alias": parsed.alias,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Input:".dimmed(), expression.yellow());
            println!("{} {}", "SQL:".green().bold(), parsed.to_string().white());
        }
    }
    Ok(())
}
