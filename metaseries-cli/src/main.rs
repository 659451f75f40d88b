//! Metaseries CLI: fetch named series, query sources directly, manage the cache.
//!
//! Commands:
//! - `get`: assemble catalog names into one table (CSV / JSON / Parquet)
//! - `raw`: fetch one series straight from a source, bypassing the catalog
//! - `cache list`: show cached ranges
//! - `cache clear`: remove cached ranges by source, symbol, or all
//! - `catalog show`: list catalog entries or show one entry's metadata

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use metaseries_core::client::source_rules;
use metaseries_core::data::export::{self, ExportFormat, Layout};
use metaseries_core::data::{ClearFilter, SourceRegistry};
use metaseries_core::domain::{FetchRequest, Frequency};
use metaseries_core::{Catalog, Client, Config, GetOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "metaseries.toml";
const DEFAULT_CATALOG: &str = "catalog.toml";

#[derive(Parser)]
#[command(
    name = "metaseries",
    about = "Metaseries CLI: cached financial time series from many sources"
)]
struct Cli {
    /// Config file. Defaults to ./metaseries.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file(s). Defaults to ./catalog.toml.
    #[arg(long, global = true)]
    catalog: Vec<PathBuf>,

    /// Cache database path (overrides the config and METASERIES_CACHE_PATH).
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Run without the cache.
    #[arg(long, global = true, default_value_t = false)]
    no_store: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Wide,
    Long,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Wide => Layout::Wide,
            LayoutArg::Long => Layout::Long,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble catalog names into one table.
    Get {
        /// Catalog names, in output column order.
        #[arg(required = true)]
        names: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Align every series to this frequency (daily, weekly, monthly, quarterly, annual).
        #[arg(long)]
        frequency: Option<String>,

        /// Skip cache lookups (fresh data is still cached).
        #[arg(long, default_value_t = false)]
        no_cache: bool,

        /// Table layout.
        #[arg(long, value_enum, default_value = "wide")]
        layout: LayoutArg,

        /// Write to this file (format from extension) instead of CSV on stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fetch one series directly from a source.
    Raw {
        #[arg(long)]
        source: String,

        #[arg(long)]
        symbol: String,

        /// Source-specific field (e.g. PX_LAST).
        #[arg(long)]
        field: Option<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Skip cache lookups (fresh data is still cached).
        #[arg(long, default_value_t = false)]
        no_cache: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Catalog inspection commands.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show every cached range.
    List {
        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Remove cached ranges.
    Clear {
        /// Only entries from this source.
        #[arg(long, conflicts_with_all = ["symbol", "all"])]
        source: Option<String>,

        /// Only entries for this symbol.
        #[arg(long, conflicts_with = "all")]
        symbol: Option<String>,

        /// Remove everything.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List entries, or show one entry's metadata as JSON.
    Show { name: Option<String> },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metaseries=info,metaseries_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Get {
            names,
            start,
            end,
            frequency,
            no_cache,
            layout,
            output,
        } => {
            let client = build_client(&cli, &config, true)?;
            let options = GetOptions {
                frequency: frequency
                    .as_deref()
                    .map(str::parse::<Frequency>)
                    .transpose()?,
                bypass_cache: *no_cache,
            };
            let (start, end) = parse_range(start, end.as_deref())?;
            run_get(&client, names, start, end, &options, (*layout).into(), output.as_deref())
        }
        Commands::Raw {
            source,
            symbol,
            field,
            start,
            end,
            no_cache,
        } => {
            let client = build_client(&cli, &config, false)?;
            let (start, end) = parse_range(start, end.as_deref())?;
            let request = FetchRequest::new(source, symbol, field.clone(), start, end);
            run_raw(&client, &request, *no_cache)
        }
        Commands::Cache { action } => {
            let client = build_client(&cli, &config, false)?;
            match action {
                CacheAction::List { json } => run_cache_list(&client, *json),
                CacheAction::Clear {
                    source,
                    symbol,
                    all,
                } => run_cache_clear(&client, source.clone(), symbol.clone(), *all),
            }
        }
        Commands::Catalog { action } => {
            let client = build_client(&cli, &config, true)?;
            match action {
                CatalogAction::Show { name } => run_catalog_show(&client, name.as_deref()),
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(Path::new(DEFAULT_CONFIG))?,
        None => Config::default(),
    };
    if let Some(path) = &cli.cache_path {
        config.store.path = Some(path.clone());
    }
    if cli.no_store {
        config.store.enabled = false;
    }
    Ok(config)
}

fn build_client(cli: &Cli, config: &Config, require_catalog: bool) -> Result<Client> {
    let rules = source_rules(config);
    let catalog = if !cli.catalog.is_empty() {
        Catalog::from_files(&cli.catalog, &rules)?
    } else if Path::new(DEFAULT_CATALOG).exists() {
        Catalog::from_file(Path::new(DEFAULT_CATALOG), &rules)?
    } else if require_catalog {
        bail!("no catalog: pass --catalog or create {DEFAULT_CATALOG}");
    } else {
        Catalog::new()
    };
    Ok(Client::new(catalog, SourceRegistry::new(), config)?)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn parse_range(start: &str, end: Option<&str>) -> Result<(NaiveDate, NaiveDate)> {
    let start = parse_date(start)?;
    let end = match end {
        Some(end) => parse_date(end)?,
        None => chrono::Local::now().date_naive(),
    };
    if start > end {
        bail!("start {start} is after end {end}");
    }
    Ok((start, end))
}

fn run_get(
    client: &Client,
    names: &[String],
    start: NaiveDate,
    end: NaiveDate,
    options: &GetOptions,
    layout: Layout,
    output: Option<&Path>,
) -> Result<()> {
    let table = client.get(names, start, end, options)?;
    match output {
        Some(path) => {
            let format = ExportFormat::from_path(path)?;
            export::write_table(&table, path, format, layout)?;
            eprintln!(
                "Wrote {} rows x {} columns to {}",
                table.row_count(),
                table.columns.len(),
                path.display()
            );
        }
        None => export::write_csv(&table, std::io::stdout().lock(), layout)?,
    }
    client.close();
    Ok(())
}

fn run_raw(client: &Client, request: &FetchRequest, bypass_cache: bool) -> Result<()> {
    let result = client.get_raw(request, bypass_cache)?;
    println!("date,value");
    for obs in result.series.points() {
        println!("{},{}", obs.date, obs.value);
    }
    eprintln!(
        "{} points ({})",
        result.series.len(),
        if result.from_cache { "cache" } else { "source" }
    );
    client.close();
    Ok(())
}

fn run_cache_list(client: &Client, json: bool) -> Result<()> {
    let entries = client.list_cached()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("Cache is empty");
        return Ok(());
    }

    println!(
        "{:<12} {:<20} {:<10} {:<23} {:>7}  {}",
        "Source", "Symbol", "Field", "Range", "Points", "Cached at"
    );
    println!("{}", "-".repeat(100));
    for e in &entries {
        println!(
            "{:<12} {:<20} {:<10} {:<23} {:>7}  {}",
            e.source,
            e.symbol,
            e.field.as_deref().unwrap_or("-"),
            format!("{}..{}", e.start, e.end),
            e.points,
            e.cached_at
        );
    }
    println!();
    println!("{} entries", entries.len());
    Ok(())
}

fn run_cache_clear(
    client: &Client,
    source: Option<String>,
    symbol: Option<String>,
    all: bool,
) -> Result<()> {
    let filter = match (source, symbol, all) {
        (Some(source), None, false) => ClearFilter::Source(source),
        (None, Some(symbol), false) => ClearFilter::Symbol(symbol),
        (None, None, true) => ClearFilter::All,
        _ => bail!("pass exactly one of --source, --symbol or --all"),
    };
    let removed = client.clear_cache(&filter)?;
    println!("Removed {removed} cached entries");
    Ok(())
}

fn run_catalog_show(client: &Client, name: Option<&str>) -> Result<()> {
    if let Some(name) = name {
        let meta = client.metadata(name)?;
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    let catalog = client.catalog();
    println!(
        "{:<20} {:<12} {:<20} {:<10} {:<10}",
        "Name", "Source", "Symbol", "Field", "Frequency"
    );
    println!("{}", "-".repeat(76));
    for entry in catalog.entries() {
        println!(
            "{:<20} {:<12} {:<20} {:<10} {:<10}",
            entry.name,
            entry.source,
            entry.symbol,
            entry.field.as_deref().unwrap_or("-"),
            entry.frequency.as_str()
        );
    }
    println!();
    println!("{} entries", catalog.len());
    Ok(())
}
